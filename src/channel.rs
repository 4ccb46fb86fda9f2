// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! This module handles the creation and management of AMQP connections and channels
//! on top of lapin. The connection can be established eagerly or left for the topology
//! provisioner to open lazily, and every lapin failure is normalised into the crate
//! error taxonomy at this boundary.

use crate::{
    attributes::{field_table, FieldMap, MessageAttributes},
    config::RabbitMQConfigs,
    errors::AmqpError,
    exchange::ExchangeOptions,
    flags::{DeclareFlags, PublishFlags},
    invocation::{self, normalize},
    transport::{AmqpChannel, AmqpConnection, ChannelRole},
};
use async_trait::async_trait;
use lapin::{
    options::{ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions},
    publisher_confirm::Confirmation,
    types::{FieldTable, LongString},
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// A lapin connection that may be opened after it is created.
pub struct LapinConnection {
    uri: String,
    properties: ConnectionProperties,
    inner: RwLock<Option<Connection>>,
}

impl LapinConnection {
    /// Creates a connection handle without connecting.
    pub fn new(cfg: &RabbitMQConfigs) -> LapinConnection {
        let properties = ConnectionProperties::default()
            .with_connection_name(LongString::from(cfg.connection_name.clone()));

        LapinConnection {
            uri: cfg.uri(),
            properties,
            inner: RwLock::new(None),
        }
    }

    /// Creates a connection handle and connects right away.
    ///
    /// # Example
    /// ```ignore
    /// let conn = LapinConnection::open(&configs.connection).await?;
    /// ```
    pub async fn open(cfg: &RabbitMQConfigs) -> Result<Arc<LapinConnection>, AmqpError> {
        let conn = LapinConnection::new(cfg);
        conn.connect().await?;
        Ok(Arc::new(conn))
    }
}

#[async_trait]
impl AmqpConnection for LapinConnection {
    fn is_connected(&self) -> bool {
        match self.inner.try_read() {
            Ok(guard) => guard.as_ref().is_some_and(|c| c.status().connected()),
            Err(_) => false,
        }
    }

    async fn connect(&self) -> Result<(), AmqpError> {
        let mut guard = self.inner.write().await;
        if guard.as_ref().is_some_and(|c| c.status().connected()) {
            return Ok(());
        }

        debug!("creating amqp connection...");
        let conn = match Connection::connect(&self.uri, self.properties.clone()).await {
            Ok(c) => Ok(c),
            Err(err) => {
                error!(error = err.to_string(), "failure to connect");
                Err(AmqpError::ConnectionError)
            }
        }?;
        debug!("amqp connected");

        *guard = Some(conn);
        Ok(())
    }

    async fn create_channel(&self) -> Result<Arc<dyn AmqpChannel>, AmqpError> {
        let guard = self.inner.read().await;
        let Some(conn) = guard.as_ref() else {
            error!("no connection available to create the channel");
            return Err(AmqpError::ConnectionLost);
        };

        debug!("creating amqp channel...");
        match conn.create_channel().await {
            Ok(channel) => {
                debug!("channel created");
                Ok(Arc::new(LapinChannel { channel }))
            }
            Err(err) => Err(normalize(err, |_| AmqpError::ChannelError)),
        }
    }
}

/// A lapin channel.
pub struct LapinChannel {
    channel: Channel,
}

#[async_trait]
impl AmqpChannel for LapinChannel {
    async fn confirm_select(&self) -> Result<(), AmqpError> {
        self.channel
            .confirm_select(ConfirmSelectOptions { nowait: false })
            .await
            .map_err(|err| normalize(err, |_| AmqpError::ChannelError))
    }

    async fn exchange_declare(&self, options: &ExchangeOptions) -> Result<(), AmqpError> {
        // the default exchange always exists and cannot be declared
        if options.name.is_empty() {
            debug!("using the default exchange");
            return Ok(());
        }

        debug!("creating exchange: {}", options.name);
        self.channel
            .exchange_declare(
                &options.name,
                lapin::ExchangeKind::from(&options.kind),
                ExchangeDeclareOptions {
                    passive: options.passive,
                    durable: options.durable,
                    auto_delete: options.auto_delete,
                    internal: options.internal,
                    nowait: false,
                },
                field_table(&options.arguments),
            )
            .await
            .map_err(|err| {
                normalize(err, |_| {
                    AmqpError::DeclareExchangeError(options.name.clone())
                })
            })?;
        debug!("exchange: {} was created", options.name);

        Ok(())
    }

    async fn queue_declare(
        &self,
        name: &str,
        flags: DeclareFlags,
        arguments: &FieldMap,
    ) -> Result<String, AmqpError> {
        debug!("creating queue: {}", name);
        let queue = self
            .channel
            .queue_declare(name, flags.into(), field_table(arguments))
            .await
            .map_err(|err| normalize(err, |_| AmqpError::DeclareQueueError(name.to_owned())))?;
        debug!("queue: {} was created", queue.name());

        Ok(queue.name().to_string())
    }

    async fn queue_bind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: Option<&str>,
    ) -> Result<(), AmqpError> {
        let routing_key = routing_key.unwrap_or_default();
        debug!(
            "binding queue: {} to the exchange: {} with the key: {}",
            queue, exchange, routing_key
        );

        self.channel
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions { nowait: false },
                FieldTable::default(),
            )
            .await
            .map_err(|err| {
                normalize(err, |_| {
                    AmqpError::BindingExchangeToQueueError(exchange.to_owned(), queue.to_owned())
                })
            })
    }

    async fn basic_publish(
        &self,
        exchange: &str,
        routing_key: Option<&str>,
        flags: PublishFlags,
        payload: &[u8],
        attributes: &MessageAttributes,
    ) -> Result<bool, AmqpError> {
        let to_exchange_error = |err: &lapin::Error| AmqpError::ExchangeError(err.to_string());

        let confirm = self
            .channel
            .basic_publish(
                exchange,
                routing_key.unwrap_or_default(),
                flags.into(),
                payload,
                BasicProperties::from(attributes),
            )
            .await
            .map_err(|err| normalize(err, to_exchange_error))?;

        let confirmation = confirm
            .await
            .map_err(|err| normalize(err, to_exchange_error))?;

        Ok(confirmed(confirmation))
    }
}

/// Maps a publisher confirmation to the publish result.
///
/// Without confirm mode every publish counts as accepted; a nack or a message returned
/// as unroutable counts as refused.
fn confirmed(confirmation: Confirmation) -> bool {
    match confirmation {
        Confirmation::Ack(None) | Confirmation::NotRequested => true,
        Confirmation::Ack(Some(returned)) => {
            debug!(
                reply_code = returned.reply_code,
                reply_text = returned.reply_text.as_str(),
                "message returned by the broker"
            );
            false
        }
        Confirmation::Nack(_) => {
            debug!("message nacked by the broker");
            false
        }
    }
}

/// The built-in channel role, optionally switching channels to publisher confirm mode.
pub struct ChannelFactory {
    confirms: bool,
}

impl ChannelFactory {
    /// Creates a channel factory.
    ///
    /// # Parameters
    /// * `confirms` - Whether opened channels are switched to publisher confirm mode
    pub fn new(confirms: bool) -> ChannelFactory {
        ChannelFactory { confirms }
    }
}

#[async_trait]
impl ChannelRole for ChannelFactory {
    async fn open(
        &self,
        connection: &dyn AmqpConnection,
    ) -> Result<Arc<dyn AmqpChannel>, AmqpError> {
        let channel =
            invocation::call("connection", "create_channel", connection.create_channel()).await?;

        if self.confirms {
            invocation::call("channel", "confirm_select", channel.confirm_select()).await?;
        }

        Ok(channel)
    }
}
