// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Management for RabbitMQ
//!
//! This module provides the declarative queue options read from configuration and
//! the queue handle used by the topology provisioner to declare a queue and bind it
//! to the producer's exchange.

use crate::{
    attributes::{FieldMap, FieldValue},
    errors::AmqpError,
    flags::DeclareFlags,
    invocation,
    transport::{AmqpChannel, AmqpQueue, QueueRole},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Declarative queue configuration.
///
/// A queue is provisioned only when `name` is present, even when it is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub arguments: FieldMap,
    pub passive: bool,
    pub durable: bool,
    pub auto_delete: bool,
    pub routing_keys: Vec<String>,
}

impl QueueOptions {
    /// Creates queue options that trigger provisioning of the named queue.
    ///
    /// # Parameters
    /// * `name` - The name of the queue, empty to let the broker generate one
    ///
    /// # Returns
    /// New queue options with default settings
    pub fn new(name: &str) -> QueueOptions {
        QueueOptions {
            name: Some(name.to_owned()),
            ..Default::default()
        }
    }

    /// Makes the queue durable, persisting across broker restarts.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Makes the queue auto-delete, removed once its last consumer is gone.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn auto_delete(mut self) -> Self {
        self.auto_delete = true;
        self
    }

    /// Makes the declaration passive, only checking that the queue exists.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    /// Sets the routing keys the queue is bound with, in addition to the unkeyed binding.
    ///
    /// Duplicated keys are bound as many times as they appear.
    ///
    /// # Parameters
    /// * `keys` - The binding routing keys
    ///
    /// # Returns
    /// Self for method chaining
    pub fn routing_keys(mut self, keys: &[&str]) -> Self {
        self.routing_keys = keys.iter().map(|k| (*k).to_owned()).collect();
        self
    }

    /// Adds a queue declaration argument, such as `x-message-ttl`.
    ///
    /// # Parameters
    /// * `key` - The argument name
    /// * `value` - The argument value
    ///
    /// # Returns
    /// Self for method chaining
    pub fn argument(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.arguments.insert(key.to_owned(), value.into());
        self
    }

    /// Declaration flags derived from the boolean options.
    pub fn flags(&self) -> DeclareFlags {
        DeclareFlags {
            passive: self.passive,
            durable: self.durable,
            auto_delete: self.auto_delete,
        }
    }
}

/// Queue handle declaring and binding through an AMQP channel.
pub struct ChannelQueue {
    channel: Arc<dyn AmqpChannel>,
    name: String,
    arguments: FieldMap,
    flags: DeclareFlags,
}

impl ChannelQueue {
    pub fn new(channel: Arc<dyn AmqpChannel>, name: &str) -> ChannelQueue {
        ChannelQueue {
            channel,
            name: name.to_owned(),
            arguments: FieldMap::new(),
            flags: DeclareFlags::default(),
        }
    }
}

#[async_trait]
impl AmqpQueue for ChannelQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_arguments(&mut self, arguments: FieldMap) {
        self.arguments = arguments;
    }

    fn set_flags(&mut self, flags: DeclareFlags) {
        self.flags = flags;
    }

    async fn declare(&mut self) -> Result<(), AmqpError> {
        self.name = invocation::call(
            &self.name,
            "queue_declare",
            self.channel.queue_declare(&self.name, self.flags, &self.arguments),
        )
        .await?;

        Ok(())
    }

    async fn bind(&self, exchange: &str, routing_key: Option<&str>) -> Result<(), AmqpError> {
        invocation::call(
            &self.name,
            "queue_bind",
            self.channel.queue_bind(&self.name, exchange, routing_key),
        )
        .await
    }
}

/// The built-in queue role: queues backed by the channel they are created on.
pub struct ChannelQueueFactory;

impl QueueRole for ChannelQueueFactory {
    fn create(&self, channel: Arc<dyn AmqpChannel>, name: &str) -> Box<dyn AmqpQueue> {
        Box::new(ChannelQueue::new(channel, name))
    }
}
