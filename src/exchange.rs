// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Management for RabbitMQ
//!
//! This module provides the declarative exchange options read from configuration and
//! the exchange handle a producer publishes through. Exchanges are the routing mechanism
//! in RabbitMQ that determine how messages are distributed to queues.

use crate::{
    attributes::{FieldMap, MessageAttributes},
    errors::AmqpError,
    flags::PublishFlags,
    invocation,
    transport::{AmqpChannel, AmqpExchange, ExchangeRole},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Constant for the argument used to specify the delayed exchange type
pub const AMQP_HEADERS_DELAYED_EXCHANGE_TYPE: &str = "x-delayed-type";

/// Represents the types of exchanges available in RabbitMQ.
///
/// Each exchange type has specific routing behavior:
/// - Direct: Routes messages to queues based on an exact match of routing keys
/// - Fanout: Broadcasts messages to all bound queues regardless of routing keys
/// - Topic: Routes messages based on wildcard pattern matching of routing keys
/// - Headers: Routes based on message header values instead of routing keys
/// - XMessageDelayed: Extension for delayed message delivery (plugin required)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    #[default]
    Direct,
    Fanout,
    Topic,
    Headers,
    #[serde(rename = "x-delayed-message")]
    XMessageDelayed,
}

impl From<&ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: &ExchangeKind) -> Self {
        match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
            ExchangeKind::Headers => lapin::ExchangeKind::Headers,
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
            ExchangeKind::XMessageDelayed => {
                lapin::ExchangeKind::Custom("x-delayed-message".to_owned())
            }
        }
    }
}

/// Declarative exchange configuration.
///
/// `publish_attributes` and `routing_keys` stay `None` when absent from the
/// configuration; a producer normalises them to empty values when it is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeOptions {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ExchangeKind,
    pub durable: bool,
    pub auto_delete: bool,
    pub passive: bool,
    pub internal: bool,
    pub arguments: FieldMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_attributes: Option<MessageAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_keys: Option<Vec<String>>,
}

impl ExchangeOptions {
    /// Creates options for an exchange with the given name.
    ///
    /// By default, the exchange is a non-durable Direct exchange without publish defaults.
    ///
    /// # Parameters
    /// * `name` - The name of the exchange, empty for the default exchange
    ///
    /// # Returns
    /// New exchange options with default settings
    pub fn new(name: &str) -> ExchangeOptions {
        ExchangeOptions {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Sets the exchange type.
    ///
    /// # Parameters
    /// * `kind` - The exchange type
    ///
    /// # Returns
    /// Self for method chaining
    pub fn kind(mut self, kind: ExchangeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Makes the exchange a delayed exchange routing like `kind` once the delay expires.
    ///
    /// This requires the x-delayed-message plugin to be installed on the RabbitMQ server.
    ///
    /// # Parameters
    /// * `kind` - The exchange type used to route the messages after the delay
    ///
    /// # Returns
    /// Self for method chaining
    pub fn delayed(mut self, kind: &str) -> Self {
        self.kind = ExchangeKind::XMessageDelayed;
        self.arguments
            .insert(AMQP_HEADERS_DELAYED_EXCHANGE_TYPE.to_owned(), kind.into());
        self
    }

    /// Makes the exchange durable, surviving broker restarts.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Makes the exchange auto-delete, removed once no queue is bound to it anymore.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn auto_delete(mut self) -> Self {
        self.auto_delete = true;
        self
    }

    /// Makes the declaration passive, only checking that the exchange exists.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    /// Sets the attributes applied to messages published without attributes.
    ///
    /// # Parameters
    /// * `attributes` - The default message attributes
    ///
    /// # Returns
    /// Self for method chaining
    pub fn publish_attributes(mut self, attributes: MessageAttributes) -> Self {
        self.publish_attributes = Some(attributes);
        self
    }

    /// Sets the routing keys used when a publish names none.
    ///
    /// # Parameters
    /// * `keys` - The default routing keys, in publish order
    ///
    /// # Returns
    /// Self for method chaining
    pub fn routing_keys(mut self, keys: &[&str]) -> Self {
        self.routing_keys = Some(keys.iter().map(|k| (*k).to_owned()).collect());
        self
    }
}

/// Exchange handle publishing through an AMQP channel.
pub struct ChannelExchange {
    channel: Arc<dyn AmqpChannel>,
    options: ExchangeOptions,
}

impl ChannelExchange {
    /// Creates an exchange handle on `channel`. Nothing is declared until `declare`.
    pub fn new(channel: Arc<dyn AmqpChannel>, options: &ExchangeOptions) -> ChannelExchange {
        ChannelExchange {
            channel,
            options: options.clone(),
        }
    }
}

#[async_trait]
impl AmqpExchange for ChannelExchange {
    fn name(&self) -> &str {
        &self.options.name
    }

    async fn declare(&self) -> Result<(), AmqpError> {
        invocation::call(
            &self.options.name,
            "exchange_declare",
            self.channel.exchange_declare(&self.options),
        )
        .await
    }

    async fn publish(
        &self,
        message: &str,
        routing_key: Option<&str>,
        flags: PublishFlags,
        attributes: &MessageAttributes,
    ) -> Result<bool, AmqpError> {
        self.channel
            .basic_publish(
                &self.options.name,
                routing_key,
                flags,
                message.as_bytes(),
                attributes,
            )
            .await
    }
}

/// The built-in exchange role: exchanges backed by the channel they are created on.
pub struct ChannelExchangeFactory;

impl ExchangeRole for ChannelExchangeFactory {
    fn create(
        &self,
        channel: Arc<dyn AmqpChannel>,
        options: &ExchangeOptions,
    ) -> Box<dyn AmqpExchange> {
        Box::new(ChannelExchange::new(channel, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{attributes::FieldValue, testing::RecordingChannel};

    #[test]
    fn parses_exchange_options() {
        let opts: ExchangeOptions = serde_json::from_str(
            r#"{"name": "orders", "type": "topic", "durable": true, "routing_keys": ["a.b"]}"#,
        )
        .unwrap();

        assert_eq!(opts.name, "orders");
        assert_eq!(opts.kind, ExchangeKind::Topic);
        assert!(opts.durable);
        assert!(!opts.auto_delete);
        assert_eq!(opts.routing_keys, Some(vec!["a.b".to_owned()]));
        assert_eq!(opts.publish_attributes, None);
    }

    #[test]
    fn delayed_exchange_carries_the_routing_type() {
        let opts = ExchangeOptions::new("later").delayed("fanout");

        assert_eq!(opts.kind, ExchangeKind::XMessageDelayed);
        assert_eq!(
            opts.arguments.get(AMQP_HEADERS_DELAYED_EXCHANGE_TYPE),
            Some(&FieldValue::from("fanout"))
        );
        assert!(matches!(
            lapin::ExchangeKind::from(&opts.kind),
            lapin::ExchangeKind::Custom(kind) if kind == "x-delayed-message"
        ));
    }

    #[tokio::test]
    async fn publishes_through_its_channel() {
        let channel = Arc::new(RecordingChannel::default());
        let exchange =
            ChannelExchangeFactory.create(channel.clone(), &ExchangeOptions::new("orders"));

        exchange.declare().await.unwrap();
        let ok = exchange
            .publish(
                "hello",
                Some("eu"),
                PublishFlags::default(),
                &MessageAttributes::default(),
            )
            .await
            .unwrap();

        assert!(ok);
        assert_eq!(exchange.name(), "orders");
        assert_eq!(
            channel.calls(),
            vec![
                "exchange_declare orders".to_owned(),
                "publish orders eu hello".to_owned()
            ]
        );
    }
}
