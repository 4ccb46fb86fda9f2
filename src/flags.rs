// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Publish and Declare Flags
//!
//! Named boolean flag sets used when publishing messages and declaring queues.
//! Each type converts to both the integer bitmask used by configuration files
//! and to the option structs expected by lapin.

use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use serde::{Deserialize, Serialize};

/// No flag set
pub const AMQP_NOPARAM: u32 = 0;
/// Survive broker restarts
pub const AMQP_DURABLE: u32 = 2;
/// Only check that the entity exists
pub const AMQP_PASSIVE: u32 = 4;
/// Delete the entity once it is no longer used
pub const AMQP_AUTODELETE: u32 = 16;
/// Fail the publish when the message cannot be routed
pub const AMQP_MANDATORY: u32 = 1024;
/// Fail the publish when the message cannot be delivered right away
pub const AMQP_IMMEDIATE: u32 = 2048;

/// Flags applied to a single publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishFlags {
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub immediate: bool,
}

impl PublishFlags {
    /// Flags asking the broker to return messages that no queue receives.
    pub fn mandatory() -> Self {
        PublishFlags {
            mandatory: true,
            immediate: false,
        }
    }

    /// Reads the mandatory and immediate bits, ignoring any other bit.
    pub fn from_bits(bits: u32) -> Self {
        PublishFlags {
            mandatory: bits & AMQP_MANDATORY != 0,
            immediate: bits & AMQP_IMMEDIATE != 0,
        }
    }

    /// Union of MANDATORY and IMMEDIATE for the flags that are set.
    pub fn bits(&self) -> u32 {
        let mut bits = AMQP_NOPARAM;
        if self.mandatory {
            bits |= AMQP_MANDATORY;
        }
        if self.immediate {
            bits |= AMQP_IMMEDIATE;
        }
        bits
    }
}

impl From<PublishFlags> for BasicPublishOptions {
    fn from(flags: PublishFlags) -> Self {
        BasicPublishOptions {
            mandatory: flags.mandatory,
            immediate: flags.immediate,
        }
    }
}

/// Flags applied when a queue is declared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeclareFlags {
    pub passive: bool,
    pub durable: bool,
    pub auto_delete: bool,
}

impl DeclareFlags {
    /// Union of PASSIVE, DURABLE and AUTODELETE for the flags that are set.
    pub fn bits(&self) -> u32 {
        let mut bits = AMQP_NOPARAM;
        if self.passive {
            bits |= AMQP_PASSIVE;
        }
        if self.durable {
            bits |= AMQP_DURABLE;
        }
        if self.auto_delete {
            bits |= AMQP_AUTODELETE;
        }
        bits
    }
}

impl From<DeclareFlags> for QueueDeclareOptions {
    fn from(flags: DeclareFlags) -> Self {
        QueueDeclareOptions {
            passive: flags.passive,
            durable: flags.durable,
            exclusive: false,
            auto_delete: flags.auto_delete,
            nowait: false,
        }
    }
}
