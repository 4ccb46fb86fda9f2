// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Pre-Publish Interception
//!
//! A producer may carry a chain of filters that see every message right before it is
//! transmitted. Filters run synchronously, in registration order, and each one receives
//! the candidate publish and hands back the (possibly rewritten) candidate. A filter can
//! veto the publish, which stops the chain and turns the publish into a successful no-op.
//! A filter error aborts the publish.

use crate::{attributes::MessageAttributes, errors::AmqpError, flags::PublishFlags};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// The candidate publish handed to pre-publish filters.
#[derive(Debug, Clone, PartialEq)]
pub struct PrePublishEvent {
    pub message: String,
    pub routing_keys: Vec<String>,
    pub flags: PublishFlags,
    pub attributes: MessageAttributes,
    can_publish: bool,
}

impl PrePublishEvent {
    /// Creates an event for a message that may be published.
    ///
    /// # Parameters
    /// * `message` - The message body
    /// * `routing_keys` - The resolved routing keys
    /// * `flags` - The publish flags
    /// * `attributes` - The resolved message attributes
    pub fn new(
        message: String,
        routing_keys: Vec<String>,
        flags: PublishFlags,
        attributes: MessageAttributes,
    ) -> PrePublishEvent {
        PrePublishEvent {
            message,
            routing_keys,
            flags,
            attributes,
            can_publish: true,
        }
    }

    /// Whether the message may still be transmitted.
    pub fn can_publish(&self) -> bool {
        self.can_publish
    }

    /// Drops the message: nothing is transmitted and the publish reports success.
    pub fn deny_publish(&mut self) {
        self.can_publish = false;
    }
}

/// Inspects, rewrites or vetoes a message before it is transmitted.
#[cfg_attr(test, mockall::automock)]
pub trait PrePublishFilter: Send + Sync {
    /// Returns the possibly rewritten event; an error aborts the publish.
    fn apply(&self, event: PrePublishEvent) -> Result<PrePublishEvent, AmqpError>;
}

impl<F> PrePublishFilter for F
where
    F: Fn(PrePublishEvent) -> Result<PrePublishEvent, AmqpError> + Send + Sync,
{
    fn apply(&self, event: PrePublishEvent) -> Result<PrePublishEvent, AmqpError> {
        self(event)
    }
}

/// Ordered pre-publish filters.
#[derive(Clone, Default)]
pub struct PrePublishChain {
    filters: Vec<Arc<dyn PrePublishFilter>>,
}

impl PrePublishChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        PrePublishChain::default()
    }

    /// Appends a filter; it runs after every filter already in the chain.
    pub fn with<T>(mut self, filter: T) -> Self
    where
        T: PrePublishFilter + 'static,
    {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Appends a shared filter at the end of the chain.
    pub fn push(&mut self, filter: Arc<dyn PrePublishFilter>) {
        self.filters.push(filter);
    }

    /// Number of filters in the chain.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Runs the filters left to right, stopping at the first veto.
    pub fn dispatch(&self, event: PrePublishEvent) -> Result<PrePublishEvent, AmqpError> {
        let mut event = event;

        for filter in &self.filters {
            event = filter.apply(event)?;
            if !event.can_publish() {
                debug!("publish vetoed by a pre-publish filter");
                break;
            }
        }

        Ok(event)
    }
}

/// Assigns a random UUID as message id when the message has none.
pub struct MessageIdFilter;

impl PrePublishFilter for MessageIdFilter {
    fn apply(&self, mut event: PrePublishEvent) -> Result<PrePublishEvent, AmqpError> {
        if event.attributes.message_id.is_none() {
            event.attributes.message_id = Some(Uuid::new_v4().to_string());
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> PrePublishEvent {
        PrePublishEvent::new(
            "hello".to_owned(),
            vec!["a".to_owned()],
            PublishFlags::default(),
            MessageAttributes::default(),
        )
    }

    #[test]
    fn filters_run_in_order() {
        let chain = PrePublishChain::new()
            .with(|mut e: PrePublishEvent| -> Result<PrePublishEvent, AmqpError> {
                e.message.push_str(" first");
                Ok(e)
            })
            .with(|mut e: PrePublishEvent| -> Result<PrePublishEvent, AmqpError> {
                e.message.push_str(" second");
                e.routing_keys.push("b".to_owned());
                Ok(e)
            });

        let out = chain.dispatch(event()).unwrap();

        assert_eq!(out.message, "hello first second");
        assert_eq!(out.routing_keys, vec!["a", "b"]);
        assert!(out.can_publish());
    }

    #[test]
    fn veto_stops_the_chain() {
        let mut never = MockPrePublishFilter::new();
        never.expect_apply().times(0);

        let chain = PrePublishChain::new()
            .with(|mut e: PrePublishEvent| -> Result<PrePublishEvent, AmqpError> {
                e.deny_publish();
                Ok(e)
            })
            .with(never);

        let out = chain.dispatch(event()).unwrap();
        assert!(!out.can_publish());
    }

    #[test]
    fn filter_errors_abort() {
        let mut failing = MockPrePublishFilter::new();
        failing
            .expect_apply()
            .times(1)
            .returning(|_| Err(AmqpError::InterceptorError("rejected".to_owned())));
        let mut never = MockPrePublishFilter::new();
        never.expect_apply().times(0);

        let chain = PrePublishChain::new().with(failing).with(never);

        assert_eq!(
            chain.dispatch(event()),
            Err(AmqpError::InterceptorError("rejected".to_owned()))
        );
    }

    #[test]
    fn message_id_is_kept_when_present() {
        let out = MessageIdFilter.apply(event()).unwrap();
        let generated = out.attributes.message_id.clone().unwrap();
        assert!(Uuid::parse_str(&generated).is_ok());

        let again = MessageIdFilter.apply(out).unwrap();
        assert_eq!(again.attributes.message_id, Some(generated));
    }
}
