// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Attributes
//!
//! This module defines the set of AMQP basic properties a message can be published with,
//! the rule used to combine a producer's default attributes with the attributes given
//! for a single publish, and the conversion into lapin's `BasicProperties`.
//! Unset attributes are omitted on the wire, never defaulted.

use lapin::{
    types::{AMQPValue, FieldTable, LongString, ShortString},
    BasicProperties,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value stored in a header table or in declare-time arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<&FieldValue> for AMQPValue {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Bool(v) => AMQPValue::Boolean(*v),
            FieldValue::Int(v) => AMQPValue::LongLongInt(*v),
            FieldValue::Float(v) => AMQPValue::Double(*v),
            FieldValue::String(v) => AMQPValue::LongString(LongString::from(v.as_str())),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_owned())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

/// Header tables and declare arguments share the same shape.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Converts a field map into lapin's field table.
pub(crate) fn field_table(fields: &FieldMap) -> FieldTable {
    let mut btree = BTreeMap::<ShortString, AMQPValue>::default();
    for (key, value) in fields {
        btree.insert(ShortString::from(key.as_str()), AMQPValue::from(value));
    }
    FieldTable::from(btree)
}

/// The AMQP basic properties a message is published with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MessageAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_mode: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<FieldMap>,
}

impl MessageAttributes {
    /// No attribute set.
    pub const EMPTY: MessageAttributes = MessageAttributes {
        content_type: None,
        content_encoding: None,
        message_id: None,
        user_id: None,
        app_id: None,
        delivery_mode: None,
        priority: None,
        timestamp: None,
        expiration: None,
        message_type: None,
        reply_to: None,
        correlation_id: None,
        headers: None,
    };

    /// True when no attribute is set.
    pub fn is_empty(&self) -> bool {
        *self == MessageAttributes::EMPTY
    }

    /// Overlays `overrides` on top of `self`: every attribute set in `overrides` wins.
    ///
    /// The merge is shallow, a `headers` table in `overrides` replaces the default table.
    pub fn merged_with(&self, overrides: &MessageAttributes) -> MessageAttributes {
        let overrides = overrides.clone();
        let defaults = self.clone();

        MessageAttributes {
            content_type: overrides.content_type.or(defaults.content_type),
            content_encoding: overrides.content_encoding.or(defaults.content_encoding),
            message_id: overrides.message_id.or(defaults.message_id),
            user_id: overrides.user_id.or(defaults.user_id),
            app_id: overrides.app_id.or(defaults.app_id),
            delivery_mode: overrides.delivery_mode.or(defaults.delivery_mode),
            priority: overrides.priority.or(defaults.priority),
            timestamp: overrides.timestamp.or(defaults.timestamp),
            expiration: overrides.expiration.or(defaults.expiration),
            message_type: overrides.message_type.or(defaults.message_type),
            reply_to: overrides.reply_to.or(defaults.reply_to),
            correlation_id: overrides.correlation_id.or(defaults.correlation_id),
            headers: overrides.headers.or(defaults.headers),
        }
    }

    /// Resolves the attributes of one publish against the producer defaults.
    ///
    /// An empty caller map selects the defaults verbatim, empty defaults select the
    /// caller map verbatim, otherwise the two are merged with the caller winning.
    pub fn resolve(defaults: &MessageAttributes, caller: &MessageAttributes) -> MessageAttributes {
        if caller.is_empty() {
            defaults.clone()
        } else if defaults.is_empty() {
            caller.clone()
        } else {
            defaults.merged_with(caller)
        }
    }
}

impl From<&MessageAttributes> for BasicProperties {
    fn from(attrs: &MessageAttributes) -> Self {
        let mut props = BasicProperties::default();

        if let Some(v) = &attrs.content_type {
            props = props.with_content_type(ShortString::from(v.as_str()));
        }
        if let Some(v) = &attrs.content_encoding {
            props = props.with_content_encoding(ShortString::from(v.as_str()));
        }
        if let Some(v) = &attrs.message_id {
            props = props.with_message_id(ShortString::from(v.as_str()));
        }
        if let Some(v) = &attrs.user_id {
            props = props.with_user_id(ShortString::from(v.as_str()));
        }
        if let Some(v) = &attrs.app_id {
            props = props.with_app_id(ShortString::from(v.as_str()));
        }
        if let Some(v) = attrs.delivery_mode {
            props = props.with_delivery_mode(v);
        }
        if let Some(v) = attrs.priority {
            props = props.with_priority(v);
        }
        if let Some(v) = attrs.timestamp {
            props = props.with_timestamp(v);
        }
        if let Some(v) = &attrs.expiration {
            props = props.with_expiration(ShortString::from(v.as_str()));
        }
        if let Some(v) = &attrs.message_type {
            props = props.with_type(ShortString::from(v.as_str()));
        }
        if let Some(v) = &attrs.reply_to {
            props = props.with_reply_to(ShortString::from(v.as_str()));
        }
        if let Some(v) = &attrs.correlation_id {
            props = props.with_correlation_id(ShortString::from(v.as_str()));
        }
        if let Some(headers) = &attrs.headers {
            props = props.with_headers(field_table(headers));
        }

        props
    }
}
