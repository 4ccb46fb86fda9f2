// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the AMQP Producer
//!
//! This module provides the error taxonomy shared by the producer, the topology
//! provisioner and the transport adapters. Variants fall in three families:
//! configuration errors raised at setup time, transmission errors raised by the
//! transport, and interceptor errors raised by pre-publish filters.

use crate::transport::TransportRole;
use thiserror::Error;

/// Represents errors that can occur while provisioning topology or publishing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmqpError {
    /// A transport implementation identifier is unknown or registered under another role
    #[error("{role} implementation `{name}` doesn't exist or is not a {role}")]
    InvalidTransport { role: TransportRole, name: String },

    /// The requested producer kind is not registered
    #[error("producer kind `{0}` doesn't exist")]
    UnknownProducerKind(String),

    /// The configuration document could not be read
    #[error("invalid configuration `{0}`")]
    ConfigurationError(String),

    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect")]
    ConnectionError,

    /// The connection to the broker was lost
    #[error("connection to the broker was lost")]
    ConnectionLost,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// The channel is not open
    #[error("channel is not open")]
    ChannelClosed,

    /// Exchange level failure, including publishes rejected by the broker
    #[error("exchange failure `{0}`")]
    ExchangeError(String),

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding an exchange to a queue
    #[error("failure to binding exchange `{0}` to queue `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// A pre-publish filter aborted the publish
    #[error("pre-publish filter failure `{0}`")]
    InterceptorError(String),
}

impl AmqpError {
    /// Errors raised while wiring transports, producers or reading configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AmqpError::InvalidTransport { .. }
                | AmqpError::UnknownProducerKind(_)
                | AmqpError::ConfigurationError(_)
        )
    }

    /// Errors raised by the broker or the underlying transport.
    pub fn is_transmission(&self) -> bool {
        !self.is_configuration() && !matches!(self, AmqpError::InterceptorError(_))
    }
}
