// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Producer
//!
//! Publishing layer over RabbitMQ: producers built from declarative exchange and queue
//! options, with default attributes and routing keys, multi routing key fan-out and a
//! pre-publish filter chain able to rewrite or veto messages.

mod invocation;
#[cfg(test)]
mod testing;

pub mod attributes;
pub mod channel;
pub mod config;
pub mod errors;
pub mod exchange;
pub mod flags;
pub mod interceptor;
pub mod otel;
pub mod publisher;
pub mod queue;
pub mod topology;
pub mod transport;
