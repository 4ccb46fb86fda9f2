// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Topology Provisioning
//!
//! This module builds ready to use producers from declarative options. For each
//! producer it opens a channel, declares the exchange and, when the queue options name
//! a queue, declares that queue and binds it to the exchange: once without routing key,
//! then once per configured routing key.
//!
//! The channel, exchange and queue implementations are looked up by name in a
//! [`TransportRegistry`] when the provisioner is created, so a misconfigured transport
//! fails before any connection is attempted.

use crate::{
    config::AmqpConfigs,
    errors::AmqpError,
    exchange::ExchangeOptions,
    invocation,
    publisher::{Producer, ProducerKinds},
    queue::QueueOptions,
    transport::{
        AmqpConnection, ChannelRole, ExchangeRole, QueueRole, TransportClasses, TransportRegistry,
    },
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

/// Builds producers and the topology they publish to.
pub struct TopologyProvisioner {
    channel: Arc<dyn ChannelRole>,
    exchange: Arc<dyn ExchangeRole>,
    queue: Arc<dyn QueueRole>,
    producer_kinds: ProducerKinds,
}

impl TopologyProvisioner {
    /// Resolves the transport implementations named in `classes`.
    ///
    /// # Errors
    /// `AmqpError::InvalidTransport` when a name is not registered or is registered
    /// under another role.
    pub fn new(
        registry: &TransportRegistry,
        classes: &TransportClasses,
    ) -> Result<TopologyProvisioner, AmqpError> {
        Ok(TopologyProvisioner {
            channel: registry.channel(&classes.channel)?,
            exchange: registry.exchange(&classes.exchange)?,
            queue: registry.queue(&classes.queue)?,
            producer_kinds: ProducerKinds::with_defaults(),
        })
    }

    /// Replaces the producer kinds `build` can instantiate.
    ///
    /// # Parameters
    /// * `kinds` - The producer kinds available by name
    ///
    /// # Returns
    /// Self for method chaining
    pub fn with_producer_kinds(mut self, kinds: ProducerKinds) -> Self {
        self.producer_kinds = kinds;
        self
    }

    /// Provisions the topology of one producer and returns the producer.
    ///
    /// When `lazy` is set the connection is established here if it is not already.
    /// The queue is provisioned whenever `queue_options.name` is present, including
    /// an empty name; duplicated routing keys produce duplicated bindings.
    pub async fn build(
        &self,
        kind: &str,
        connection: &dyn AmqpConnection,
        exchange_options: &ExchangeOptions,
        queue_options: &QueueOptions,
        lazy: bool,
    ) -> Result<Producer, AmqpError> {
        let constructor = self.producer_kinds.get(kind)?;

        if lazy && !connection.is_connected() {
            debug!("lazy connection, connecting...");
            invocation::call("connection", "connect", connection.connect()).await?;
        }

        let channel = self.channel.open(connection).await?;

        let exchange = self.exchange.create(channel.clone(), exchange_options);
        exchange.declare().await?;

        if let Some(name) = &queue_options.name {
            let mut queue = self.queue.create(channel, name);
            queue.set_arguments(queue_options.arguments.clone());
            queue.set_flags(queue_options.flags());
            queue.declare().await?;

            queue.bind(&exchange_options.name, None).await?;
            for routing_key in &queue_options.routing_keys {
                queue.bind(&exchange_options.name, Some(routing_key)).await?;
            }

            debug!(
                queue = queue.name(),
                exchange = exchange_options.name.as_str(),
                "queue was bounded"
            );
        }

        Ok(constructor(exchange, exchange_options.clone()))
    }

    /// Builds every producer of the configuration, in name order.
    pub async fn build_all(
        &self,
        connection: &dyn AmqpConnection,
        configs: &AmqpConfigs,
    ) -> Result<BTreeMap<String, Producer>, AmqpError> {
        let mut producers = BTreeMap::new();

        for (name, def) in &configs.producers {
            debug!("building producer: {}", name);
            let producer = self
                .build(
                    &def.kind,
                    connection,
                    &def.exchange_options,
                    &def.queue_options,
                    def.lazy,
                )
                .await?;
            producers.insert(name.clone(), producer);
        }

        Ok(producers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        attributes::MessageAttributes,
        flags::{PublishFlags, AMQP_DURABLE, AMQP_PASSIVE},
        publisher::TRACED_PRODUCER_KIND,
        testing::{RecordingChannel, GENERATED_QUEUE_NAME},
        transport::{
            AmqpChannel, MockAmqpConnection, TransportRole, CONFIRM_CHANNEL, DEFAULT_EXCHANGE,
        },
    };

    fn provisioner() -> TopologyProvisioner {
        TopologyProvisioner::new(
            &TransportRegistry::with_defaults(),
            &TransportClasses::default(),
        )
        .unwrap()
    }

    fn connected(channel: &Arc<RecordingChannel>) -> MockAmqpConnection {
        let channel = channel.clone();
        let mut conn = MockAmqpConnection::new();
        conn.expect_is_connected().return_const(true);
        conn.expect_connect().times(0);
        conn.expect_create_channel()
            .times(1)
            .returning(move || Ok(channel.clone() as Arc<dyn AmqpChannel>));
        conn
    }

    #[test]
    fn rejects_transports_with_the_wrong_role() {
        let registry = TransportRegistry::with_defaults();
        let classes = TransportClasses {
            channel: DEFAULT_EXCHANGE.to_owned(),
            ..Default::default()
        };

        let err = TopologyProvisioner::new(&registry, &classes).err();

        assert_eq!(
            err,
            Some(AmqpError::InvalidTransport {
                role: TransportRole::Channel,
                name: DEFAULT_EXCHANGE.to_owned(),
            })
        );
    }

    #[test]
    fn rejects_unknown_transports() {
        let registry = TransportRegistry::with_defaults();
        let classes = TransportClasses {
            queue: "sqs".to_owned(),
            ..Default::default()
        };

        let err = TopologyProvisioner::new(&registry, &classes).err().unwrap();

        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn declares_only_the_exchange_without_queue_name() {
        let channel = Arc::new(RecordingChannel::default());
        let conn = connected(&channel);
        let queue_options = QueueOptions {
            durable: true,
            routing_keys: vec!["ignored".to_owned()],
            ..Default::default()
        };

        provisioner()
            .build(
                "default",
                &conn,
                &ExchangeOptions::new("orders"),
                &queue_options,
                false,
            )
            .await
            .unwrap();

        assert_eq!(channel.calls(), vec!["exchange_declare orders".to_owned()]);
    }

    #[tokio::test]
    async fn empty_queue_name_still_provisions_the_queue() {
        let channel = Arc::new(RecordingChannel::default());
        let conn = connected(&channel);
        let queue_options = QueueOptions::new("").routing_keys(&["a", "b", "a"]);

        provisioner()
            .build(
                "default",
                &conn,
                &ExchangeOptions::new("orders"),
                &queue_options,
                false,
            )
            .await
            .unwrap();

        assert_eq!(
            channel.calls(),
            vec![
                "exchange_declare orders".to_owned(),
                "queue_declare  0".to_owned(),
                format!("queue_bind {} orders -", GENERATED_QUEUE_NAME),
                format!("queue_bind {} orders a", GENERATED_QUEUE_NAME),
                format!("queue_bind {} orders b", GENERATED_QUEUE_NAME),
                format!("queue_bind {} orders a", GENERATED_QUEUE_NAME),
            ]
        );
    }

    #[tokio::test]
    async fn queue_flags_and_producer_defaults() {
        let channel = Arc::new(RecordingChannel::default());
        let conn = connected(&channel);
        let queue_options = QueueOptions::new("jobs").durable().passive();
        let exchange_options = ExchangeOptions::new("orders").routing_keys(&["eu"]);

        let producer = provisioner()
            .build("default", &conn, &exchange_options, &queue_options, false)
            .await
            .unwrap();

        assert_eq!(
            channel.calls()[1],
            format!("queue_declare jobs {}", AMQP_PASSIVE | AMQP_DURABLE)
        );
        assert_eq!(producer.exchange().name(), "orders");
        assert_eq!(
            producer.exchange_options().publish_attributes,
            Some(MessageAttributes::default())
        );

        producer
            .publish("hi", PublishFlags::default(), &MessageAttributes::default(), &[])
            .await
            .unwrap();
        assert_eq!(
            channel.calls().last(),
            Some(&"publish orders eu hi".to_owned())
        );
    }

    #[tokio::test]
    async fn lazy_build_connects_once() {
        let channel = Arc::new(RecordingChannel::default());
        let mut conn = MockAmqpConnection::new();
        conn.expect_is_connected().times(1).return_const(false);
        conn.expect_connect().times(1).returning(|| Ok(()));
        conn.expect_create_channel()
            .times(1)
            .returning(move || Ok(channel.clone() as Arc<dyn AmqpChannel>));

        provisioner()
            .build(
                "default",
                &conn,
                &ExchangeOptions::new("orders"),
                &QueueOptions::default(),
                true,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn lazy_build_skips_connected_connections() {
        let channel = Arc::new(RecordingChannel::default());
        let conn = connected(&channel);

        provisioner()
            .build(
                "default",
                &conn,
                &ExchangeOptions::new("orders"),
                &QueueOptions::default(),
                true,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn lazy_connect_failures_propagate() {
        let mut conn = MockAmqpConnection::new();
        conn.expect_is_connected().return_const(false);
        conn.expect_connect()
            .times(1)
            .returning(|| Err(AmqpError::ConnectionError));
        conn.expect_create_channel().times(0);

        let res = provisioner()
            .build(
                "default",
                &conn,
                &ExchangeOptions::new("orders"),
                &QueueOptions::default(),
                true,
            )
            .await;

        assert_eq!(res.err(), Some(AmqpError::ConnectionError));
    }

    #[tokio::test]
    async fn unknown_kind_fails_before_touching_the_broker() {
        let mut conn = MockAmqpConnection::new();
        conn.expect_is_connected().times(0);
        conn.expect_connect().times(0);
        conn.expect_create_channel().times(0);

        let res = provisioner()
            .build(
                "fancy",
                &conn,
                &ExchangeOptions::new("orders"),
                &QueueOptions::new("jobs"),
                true,
            )
            .await;

        assert_eq!(
            res.err(),
            Some(AmqpError::UnknownProducerKind("fancy".to_owned()))
        );
    }

    #[tokio::test]
    async fn declare_failures_propagate() {
        let channel = Arc::new(RecordingChannel::failing_queue_declare());
        let conn = connected(&channel);

        let res = provisioner()
            .build(
                "default",
                &conn,
                &ExchangeOptions::new("orders"),
                &QueueOptions::new("jobs").routing_keys(&["a"]),
                false,
            )
            .await;

        assert_eq!(
            res.err(),
            Some(AmqpError::DeclareQueueError("jobs".to_owned()))
        );
        assert_eq!(channel.calls().len(), 2);
    }

    #[tokio::test]
    async fn confirm_channel_is_selected_from_classes() {
        let channel = Arc::new(RecordingChannel::default());
        let conn = connected(&channel);
        let classes = TransportClasses {
            channel: CONFIRM_CHANNEL.to_owned(),
            ..Default::default()
        };

        TopologyProvisioner::new(&TransportRegistry::with_defaults(), &classes)
            .unwrap()
            .build(
                TRACED_PRODUCER_KIND,
                &conn,
                &ExchangeOptions::new("orders"),
                &QueueOptions::default(),
                false,
            )
            .await
            .unwrap();

        assert_eq!(
            channel.calls(),
            vec![
                "confirm_select".to_owned(),
                "exchange_declare orders".to_owned()
            ]
        );
    }

    #[tokio::test]
    async fn builds_every_configured_producer() {
        let channel = Arc::new(RecordingChannel::default());
        let channel_for_conn = channel.clone();
        let mut conn = MockAmqpConnection::new();
        conn.expect_is_connected().return_const(true);
        conn.expect_create_channel()
            .times(2)
            .returning(move || Ok(channel_for_conn.clone() as Arc<dyn AmqpChannel>));

        let configs = AmqpConfigs::from_json(
            r#"{
                "producers": {
                    "orders": {
                        "exchange_options": { "name": "orders" },
                        "queue_options": { "name": "orders-audit" }
                    },
                    "audit": { "kind": "traced", "exchange_options": { "name": "audit" } }
                }
            }"#,
        )
        .unwrap();

        let producers = provisioner().build_all(&conn, &configs).await.unwrap();

        assert_eq!(
            producers.keys().collect::<Vec<_>>(),
            vec!["audit", "orders"]
        );
        assert_eq!(
            channel.calls(),
            vec![
                "exchange_declare audit".to_owned(),
                "exchange_declare orders".to_owned(),
                "queue_declare orders-audit 0".to_owned(),
                "queue_bind orders-audit orders -".to_owned(),
            ]
        );
    }
}
