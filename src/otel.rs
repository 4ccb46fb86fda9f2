// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # OpenTelemetry Integration for RabbitMQ
//!
//! This module propagates the current trace context through RabbitMQ message headers.
//! It is installed as a pre-publish filter so every transmitted message carries the
//! context of the span it was published from.

use crate::{
    attributes::{FieldMap, FieldValue},
    errors::AmqpError,
    interceptor::{PrePublishEvent, PrePublishFilter},
};
use opentelemetry::{global, propagation::Injector, Context};

/// An adapter injecting OpenTelemetry context into a message header table.
pub(crate) struct HeaderInjector<'a> {
    headers: &'a mut FieldMap,
}

impl<'a> HeaderInjector<'a> {
    pub(crate) fn new(headers: &'a mut FieldMap) -> Self {
        Self { headers }
    }
}

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.headers.insert(key.to_lowercase(), FieldValue::String(value));
    }
}

/// Injects the current trace context into the message headers.
///
/// Uses the globally registered text map propagator; headers are left untouched when it
/// injects nothing.
pub struct TracePropagationFilter;

impl PrePublishFilter for TracePropagationFilter {
    fn apply(&self, mut event: PrePublishEvent) -> Result<PrePublishEvent, AmqpError> {
        let mut injected = FieldMap::new();
        let ctx = Context::current();

        global::get_text_map_propagator(|propagator| {
            propagator.inject_context(&ctx, &mut HeaderInjector::new(&mut injected))
        });

        if !injected.is_empty() {
            event
                .attributes
                .headers
                .get_or_insert_with(FieldMap::new)
                .extend(injected);
        }

        Ok(event)
    }
}
