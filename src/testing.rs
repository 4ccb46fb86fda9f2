// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! In-memory channel recording every call, for order sensitive assertions.

use crate::{
    attributes::{FieldMap, MessageAttributes},
    errors::AmqpError,
    exchange::ExchangeOptions,
    flags::{DeclareFlags, PublishFlags},
    transport::AmqpChannel,
};
use async_trait::async_trait;
use std::sync::Mutex;

/// Name the recording channel hands out for queues declared without a name.
pub(crate) const GENERATED_QUEUE_NAME: &str = "amq.gen-recorded";

#[derive(Default)]
pub(crate) struct RecordingChannel {
    calls: Mutex<Vec<String>>,
    published: Mutex<Vec<(Option<String>, PublishFlags, MessageAttributes)>>,
    /// Routing keys the broker refuses, publish returns `false` for them.
    pub(crate) refused_keys: Vec<String>,
    /// Routing keys whose publish fails with a closed channel.
    pub(crate) broken_keys: Vec<String>,
    pub(crate) fail_queue_declare: bool,
}

impl RecordingChannel {
    pub(crate) fn refusing(keys: &[&str]) -> Self {
        RecordingChannel {
            refused_keys: keys.iter().map(|k| (*k).to_owned()).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn breaking(keys: &[&str]) -> Self {
        RecordingChannel {
            broken_keys: keys.iter().map(|k| (*k).to_owned()).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn failing_queue_declare() -> Self {
        RecordingChannel {
            fail_queue_declare: true,
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn published(&self) -> Vec<(Option<String>, PublishFlags, MessageAttributes)> {
        self.published.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AmqpChannel for RecordingChannel {
    async fn confirm_select(&self) -> Result<(), AmqpError> {
        self.record("confirm_select".to_owned());
        Ok(())
    }

    async fn exchange_declare(&self, options: &ExchangeOptions) -> Result<(), AmqpError> {
        self.record(format!("exchange_declare {}", options.name));
        Ok(())
    }

    async fn queue_declare(
        &self,
        name: &str,
        flags: DeclareFlags,
        _arguments: &FieldMap,
    ) -> Result<String, AmqpError> {
        self.record(format!("queue_declare {} {}", name, flags.bits()));
        if self.fail_queue_declare {
            return Err(AmqpError::DeclareQueueError(name.to_owned()));
        }
        if name.is_empty() {
            return Ok(GENERATED_QUEUE_NAME.to_owned());
        }
        Ok(name.to_owned())
    }

    async fn queue_bind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: Option<&str>,
    ) -> Result<(), AmqpError> {
        self.record(format!(
            "queue_bind {} {} {}",
            queue,
            exchange,
            routing_key.unwrap_or("-")
        ));
        Ok(())
    }

    async fn basic_publish(
        &self,
        exchange: &str,
        routing_key: Option<&str>,
        flags: PublishFlags,
        payload: &[u8],
        attributes: &MessageAttributes,
    ) -> Result<bool, AmqpError> {
        self.record(format!(
            "publish {} {} {}",
            exchange,
            routing_key.unwrap_or("-"),
            String::from_utf8_lossy(payload)
        ));
        self.published.lock().unwrap().push((
            routing_key.map(str::to_owned),
            flags,
            attributes.clone(),
        ));

        let key = routing_key.unwrap_or_default();
        if self.broken_keys.iter().any(|k| k == key) {
            return Err(AmqpError::ChannelClosed);
        }
        Ok(!self.refused_keys.iter().any(|k| k == key))
    }
}
