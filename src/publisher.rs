// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Producer
//!
//! This module provides the producer turning one publish request into one or more
//! publishes on its exchange. A publish resolves its attributes and routing keys
//! against the producer defaults, runs the optional pre-publish chain, then transmits
//! once per routing key (or once without a routing key) and reports whether every
//! transmission succeeded.

use crate::{
    attributes::MessageAttributes,
    errors::AmqpError,
    exchange::ExchangeOptions,
    flags::PublishFlags,
    interceptor::{MessageIdFilter, PrePublishChain, PrePublishEvent, PrePublishFilter},
    invocation,
    otel::TracePropagationFilter,
    transport::AmqpExchange,
};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

/// Producer kind publishing messages as given
pub const DEFAULT_PRODUCER_KIND: &str = "default";
/// Producer kind assigning message ids and propagating the trace context
pub const TRACED_PRODUCER_KIND: &str = "traced";

static NO_ATTRIBUTES: MessageAttributes = MessageAttributes::EMPTY;

/// Publishes messages to one exchange it exclusively owns.
pub struct Producer {
    exchange: Box<dyn AmqpExchange>,
    exchange_options: ExchangeOptions,
    pre_publish: Option<PrePublishChain>,
}

impl Producer {
    /// Creates a producer without pre-publish chain.
    pub fn new(exchange: Box<dyn AmqpExchange>, exchange_options: ExchangeOptions) -> Producer {
        let mut producer = Producer {
            exchange,
            exchange_options: ExchangeOptions::default(),
            pre_publish: None,
        };
        producer.set_exchange_options(exchange_options);
        producer
    }

    /// Installs the pre-publish chain run before every transmission.
    ///
    /// # Parameters
    /// * `chain` - The filters to run, in order
    ///
    /// # Returns
    /// Self for method chaining
    pub fn with_pre_publish(mut self, chain: PrePublishChain) -> Self {
        self.pre_publish = Some(chain);
        self
    }

    /// Publishes `message`, returning whether every transmission succeeded.
    ///
    /// A non-empty `attributes` map is merged over the default publish attributes, a
    /// non-empty `routing_keys` list replaces the default routing keys. When a
    /// pre-publish filter vetoes the message nothing is sent and `Ok(true)` is returned.
    /// A failing routing key does not stop the remaining ones from being tried.
    ///
    /// # Parameters
    /// * `message` - The message body
    /// * `flags` - The publish flags, such as mandatory
    /// * `attributes` - Message attributes, empty to use the producer defaults
    /// * `routing_keys` - Routing keys, empty to use the producer defaults
    ///
    /// # Returns
    /// `true` when every transmission was accepted by the broker
    ///
    /// # Errors
    /// The first transport or interceptor error, aborting the remaining transmissions
    pub async fn publish(
        &self,
        message: &str,
        flags: PublishFlags,
        attributes: &MessageAttributes,
        routing_keys: &[String],
    ) -> Result<bool, AmqpError> {
        let mut attributes = MessageAttributes::resolve(self.publish_attributes(), attributes);
        let mut routing_keys = if routing_keys.is_empty() {
            self.routing_keys().to_vec()
        } else {
            routing_keys.to_vec()
        };
        let mut message = message.to_owned();
        let mut flags = flags;

        if let Some(chain) = &self.pre_publish {
            let event = chain.dispatch(PrePublishEvent::new(
                message,
                routing_keys,
                flags,
                attributes,
            ))?;

            if !event.can_publish() {
                debug!(exchange = self.exchange.name(), "message dropped before publish");
                return Ok(true);
            }

            message = event.message;
            routing_keys = event.routing_keys;
            flags = event.flags;
            attributes = event.attributes;
        }

        if routing_keys.is_empty() {
            return self.transmit(&message, None, flags, &attributes).await;
        }

        let mut results = Vec::with_capacity(routing_keys.len());
        for routing_key in &routing_keys {
            results.push(
                self.transmit(&message, Some(routing_key), flags, &attributes)
                    .await?,
            );
        }

        Ok(results.iter().all(|ok| *ok))
    }

    async fn transmit(
        &self,
        message: &str,
        routing_key: Option<&str>,
        flags: PublishFlags,
        attributes: &MessageAttributes,
    ) -> Result<bool, AmqpError> {
        invocation::call(
            self.exchange.name(),
            "publish",
            self.exchange.publish(message, routing_key, flags, attributes),
        )
        .await
    }

    /// The exchange the producer publishes to.
    pub fn exchange(&self) -> &dyn AmqpExchange {
        self.exchange.as_ref()
    }

    /// Replaces the exchange the producer publishes to.
    ///
    /// # Parameters
    /// * `exchange` - The new exchange handle
    ///
    /// # Returns
    /// The producer, for chaining further setters
    pub fn set_exchange(&mut self, exchange: Box<dyn AmqpExchange>) -> &mut Self {
        self.exchange = exchange;
        self
    }

    /// The exchange options, with publish attributes and routing keys always present.
    pub fn exchange_options(&self) -> &ExchangeOptions {
        &self.exchange_options
    }

    /// Replaces the exchange options, filling absent publish attributes and routing
    /// keys with empty values.
    pub fn set_exchange_options(&mut self, exchange_options: ExchangeOptions) -> &mut Self {
        let mut exchange_options = exchange_options;
        exchange_options
            .publish_attributes
            .get_or_insert_with(MessageAttributes::default);
        exchange_options.routing_keys.get_or_insert_with(Vec::new);

        self.exchange_options = exchange_options;
        self
    }

    /// The pre-publish chain, if any.
    pub fn pre_publish(&self) -> Option<&PrePublishChain> {
        self.pre_publish.as_ref()
    }

    /// Replaces the pre-publish chain; `None` disables interception.
    ///
    /// # Returns
    /// The producer, for chaining further setters
    pub fn set_pre_publish(&mut self, chain: Option<PrePublishChain>) -> &mut Self {
        self.pre_publish = chain;
        self
    }

    /// Appends a filter to the pre-publish chain, creating the chain if needed.
    pub fn add_pre_publish_filter(&mut self, filter: Arc<dyn PrePublishFilter>) -> &mut Self {
        self.pre_publish
            .get_or_insert_with(PrePublishChain::new)
            .push(filter);
        self
    }

    fn publish_attributes(&self) -> &MessageAttributes {
        self.exchange_options
            .publish_attributes
            .as_ref()
            .unwrap_or(&NO_ATTRIBUTES)
    }

    fn routing_keys(&self) -> &[String] {
        self.exchange_options.routing_keys.as_deref().unwrap_or(&[])
    }
}

/// Builds a producer around a declared exchange.
pub type ProducerConstructor =
    Arc<dyn Fn(Box<dyn AmqpExchange>, ExchangeOptions) -> Producer + Send + Sync>;

/// Producer kinds available by name.
#[derive(Clone, Default)]
pub struct ProducerKinds {
    kinds: HashMap<String, ProducerConstructor>,
}

impl ProducerKinds {
    /// Creates an empty registry.
    pub fn new() -> Self {
        ProducerKinds::default()
    }

    /// Creates the registry holding the `default` and `traced` kinds.
    pub fn with_defaults() -> Self {
        ProducerKinds::new()
            .register(DEFAULT_PRODUCER_KIND, Arc::new(Producer::new))
            .register(
                TRACED_PRODUCER_KIND,
                Arc::new(|exchange: Box<dyn AmqpExchange>, options: ExchangeOptions| {
                    Producer::new(exchange, options).with_pre_publish(
                        PrePublishChain::new()
                            .with(MessageIdFilter)
                            .with(TracePropagationFilter),
                    )
                }),
            )
    }

    /// Registers a producer kind, replacing any kind previously registered under `kind`.
    ///
    /// # Parameters
    /// * `kind` - The name configurations refer to
    /// * `constructor` - Builds the producer around its declared exchange
    ///
    /// # Returns
    /// Self for method chaining
    pub fn register(mut self, kind: &str, constructor: ProducerConstructor) -> Self {
        self.kinds.insert(kind.to_owned(), constructor);
        self
    }

    /// Whether a producer kind is registered under `kind`.
    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub(crate) fn get(&self, kind: &str) -> Result<ProducerConstructor, AmqpError> {
        self.kinds
            .get(kind)
            .cloned()
            .ok_or_else(|| AmqpError::UnknownProducerKind(kind.to_owned()))
    }
}
