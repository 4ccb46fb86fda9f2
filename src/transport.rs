// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Transport Roles
//!
//! This module defines the minimal capability set the producer and the topology
//! provisioner need from the broker transport: a connection, a channel, an exchange
//! handle and a queue handle. Concrete implementations are registered by name in a
//! [`TransportRegistry`] so they can be selected from configuration, and each name is
//! checked against the role it is used for once, when the provisioner is created.

use crate::{
    attributes::{FieldMap, MessageAttributes},
    channel::ChannelFactory,
    errors::AmqpError,
    exchange::{ChannelExchangeFactory, ExchangeOptions},
    flags::{DeclareFlags, PublishFlags},
    queue::ChannelQueueFactory,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, sync::Arc};

/// A connection to the broker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AmqpConnection: Send + Sync {
    /// Whether the connection is currently established.
    fn is_connected(&self) -> bool;

    /// Establishes the connection.
    async fn connect(&self) -> Result<(), AmqpError>;

    /// Opens a new channel on the connection.
    async fn create_channel(&self) -> Result<Arc<dyn AmqpChannel>, AmqpError>;
}

/// The channel level operations issued while provisioning and publishing.
#[async_trait]
pub trait AmqpChannel: Send + Sync {
    /// Switches the channel to publisher confirm mode.
    async fn confirm_select(&self) -> Result<(), AmqpError>;

    async fn exchange_declare(&self, options: &ExchangeOptions) -> Result<(), AmqpError>;

    /// Declares a queue, returning its name as known by the broker.
    ///
    /// The broker generates the name when `name` is empty.
    async fn queue_declare(
        &self,
        name: &str,
        flags: DeclareFlags,
        arguments: &FieldMap,
    ) -> Result<String, AmqpError>;

    async fn queue_bind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: Option<&str>,
    ) -> Result<(), AmqpError>;

    /// Publishes one message, returning whether the broker accepted it.
    async fn basic_publish(
        &self,
        exchange: &str,
        routing_key: Option<&str>,
        flags: PublishFlags,
        payload: &[u8],
        attributes: &MessageAttributes,
    ) -> Result<bool, AmqpError>;
}

/// A handle on one exchange, owned by exactly one producer.
#[async_trait]
pub trait AmqpExchange: Send + Sync {
    fn name(&self) -> &str;

    async fn declare(&self) -> Result<(), AmqpError>;

    async fn publish(
        &self,
        message: &str,
        routing_key: Option<&str>,
        flags: PublishFlags,
        attributes: &MessageAttributes,
    ) -> Result<bool, AmqpError>;
}

/// A handle on one queue, configured before it is declared.
#[async_trait]
pub trait AmqpQueue: Send + Sync {
    fn name(&self) -> &str;

    fn set_arguments(&mut self, arguments: FieldMap);

    fn set_flags(&mut self, flags: DeclareFlags);

    /// Declares the queue and takes over the name the broker assigned to it.
    async fn declare(&mut self) -> Result<(), AmqpError>;

    async fn bind(&self, exchange: &str, routing_key: Option<&str>) -> Result<(), AmqpError>;
}

/// Opens channels: the channel role.
#[async_trait]
pub trait ChannelRole: Send + Sync {
    async fn open(
        &self,
        connection: &dyn AmqpConnection,
    ) -> Result<Arc<dyn AmqpChannel>, AmqpError>;
}

/// Builds exchange handles on a channel: the exchange role.
pub trait ExchangeRole: Send + Sync {
    fn create(
        &self,
        channel: Arc<dyn AmqpChannel>,
        options: &ExchangeOptions,
    ) -> Box<dyn AmqpExchange>;
}

/// Builds queue handles on a channel: the queue role.
pub trait QueueRole: Send + Sync {
    fn create(&self, channel: Arc<dyn AmqpChannel>, name: &str) -> Box<dyn AmqpQueue>;
}

/// The role a registered transport component plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportRole {
    Channel,
    Exchange,
    Queue,
}

impl fmt::Display for TransportRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportRole::Channel => write!(f, "channel"),
            TransportRole::Exchange => write!(f, "exchange"),
            TransportRole::Queue => write!(f, "queue"),
        }
    }
}

/// A transport implementation tagged with its role.
#[derive(Clone)]
pub enum TransportComponent {
    Channel(Arc<dyn ChannelRole>),
    Exchange(Arc<dyn ExchangeRole>),
    Queue(Arc<dyn QueueRole>),
}

impl TransportComponent {
    /// The role the component was registered for.
    pub fn role(&self) -> TransportRole {
        match self {
            TransportComponent::Channel(_) => TransportRole::Channel,
            TransportComponent::Exchange(_) => TransportRole::Exchange,
            TransportComponent::Queue(_) => TransportRole::Queue,
        }
    }
}

/// Names of the transport implementations a provisioner is wired with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportClasses {
    pub channel: String,
    pub exchange: String,
    pub queue: String,
}

impl Default for TransportClasses {
    fn default() -> Self {
        TransportClasses {
            channel: DEFAULT_CHANNEL.to_owned(),
            exchange: DEFAULT_EXCHANGE.to_owned(),
            queue: DEFAULT_QUEUE.to_owned(),
        }
    }
}

/// Channel implementation opening plain channels
pub const DEFAULT_CHANNEL: &str = "channel";
/// Channel implementation opening channels in publisher confirm mode
pub const CONFIRM_CHANNEL: &str = "confirm_channel";
/// Exchange implementation backed by a channel
pub const DEFAULT_EXCHANGE: &str = "exchange";
/// Queue implementation backed by a channel
pub const DEFAULT_QUEUE: &str = "queue";

/// Transport implementations available by name.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    components: HashMap<String, TransportComponent>,
}

impl TransportRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        TransportRegistry::default()
    }

    /// Creates a registry holding the built-in channel, exchange and queue implementations.
    pub fn with_defaults() -> Self {
        TransportRegistry::new()
            .register(
                DEFAULT_CHANNEL,
                TransportComponent::Channel(Arc::new(ChannelFactory::new(false))),
            )
            .register(
                CONFIRM_CHANNEL,
                TransportComponent::Channel(Arc::new(ChannelFactory::new(true))),
            )
            .register(
                DEFAULT_EXCHANGE,
                TransportComponent::Exchange(Arc::new(ChannelExchangeFactory)),
            )
            .register(
                DEFAULT_QUEUE,
                TransportComponent::Queue(Arc::new(ChannelQueueFactory)),
            )
    }

    /// Registers a component, replacing any component previously registered under `name`.
    pub fn register(mut self, name: &str, component: TransportComponent) -> Self {
        self.components.insert(name.to_owned(), component);
        self
    }

    /// Looks up a component by name, whatever its role.
    pub fn get(&self, name: &str) -> Option<&TransportComponent> {
        self.components.get(name)
    }

    pub(crate) fn channel(&self, name: &str) -> Result<Arc<dyn ChannelRole>, AmqpError> {
        match self.get(name) {
            Some(TransportComponent::Channel(c)) => Ok(c.clone()),
            _ => Err(invalid(TransportRole::Channel, name)),
        }
    }

    pub(crate) fn exchange(&self, name: &str) -> Result<Arc<dyn ExchangeRole>, AmqpError> {
        match self.get(name) {
            Some(TransportComponent::Exchange(e)) => Ok(e.clone()),
            _ => Err(invalid(TransportRole::Exchange, name)),
        }
    }

    pub(crate) fn queue(&self, name: &str) -> Result<Arc<dyn QueueRole>, AmqpError> {
        match self.get(name) {
            Some(TransportComponent::Queue(q)) => Ok(q.clone()),
            _ => Err(invalid(TransportRole::Queue, name)),
        }
    }
}

fn invalid(role: TransportRole, name: &str) -> AmqpError {
    AmqpError::InvalidTransport {
        role,
        name: name.to_owned(),
    }
}
