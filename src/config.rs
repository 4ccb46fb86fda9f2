// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Declarative Configuration
//!
//! This module defines the configuration document describing the broker connection,
//! the transport implementations to wire, and every producer with its exchange and
//! optional queue. Documents are read as JSON.
//!
//! ```json
//! {
//!   "connection": { "host": "rabbitmq", "vhost": "billing" },
//!   "transports": { "channel": "confirm_channel" },
//!   "producers": {
//!     "invoices": {
//!       "exchange_options": { "name": "invoices", "type": "topic", "routing_keys": ["invoice.created"] },
//!       "queue_options": { "name": "invoices-archive", "durable": true }
//!     }
//!   }
//! }
//! ```

use crate::{
    errors::AmqpError, exchange::ExchangeOptions, publisher::DEFAULT_PRODUCER_KIND,
    queue::QueueOptions, transport::TransportClasses,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, io::Read};
use tracing::error;

/// Broker connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RabbitMQConfigs {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    pub connection_name: String,
}

impl Default for RabbitMQConfigs {
    fn default() -> Self {
        RabbitMQConfigs {
            host: "localhost".to_owned(),
            port: 5672,
            user: "guest".to_owned(),
            password: "guest".to_owned(),
            vhost: "/".to_owned(),
            connection_name: "amqp-producer".to_owned(),
        }
    }
}

impl RabbitMQConfigs {
    /// The AMQP URI for these parameters.
    pub fn uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.user,
            self.password,
            self.host,
            self.port,
            self.vhost.replace('/', "%2f")
        )
    }
}

/// One producer and the topology it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerDefinition {
    #[serde(default = "default_kind")]
    pub kind: String,
    pub exchange_options: ExchangeOptions,
    #[serde(default)]
    pub queue_options: QueueOptions,
    #[serde(default)]
    pub lazy: bool,
}

fn default_kind() -> String {
    DEFAULT_PRODUCER_KIND.to_owned()
}

/// The whole configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmqpConfigs {
    pub connection: RabbitMQConfigs,
    pub transports: TransportClasses,
    pub producers: BTreeMap<String, ProducerDefinition>,
}

impl AmqpConfigs {
    pub fn from_json(document: &str) -> Result<AmqpConfigs, AmqpError> {
        serde_json::from_str(document).map_err(|err| {
            error!(error = err.to_string(), "failure to parse configuration");
            AmqpError::ConfigurationError(err.to_string())
        })
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<AmqpConfigs, AmqpError> {
        serde_json::from_reader(reader).map_err(|err| {
            error!(error = err.to_string(), "failure to read configuration");
            AmqpError::ConfigurationError(err.to_string())
        })
    }
}
