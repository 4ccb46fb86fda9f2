// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Transport Invocation
//!
//! Every call into the transport goes through [`call`], which emits a debug event
//! before and after the call. Failures reported by lapin are normalised by
//! [`normalize`] into the crate error taxonomy: channel state problems, lost
//! connections, and everything else as the operation specific error.

use crate::errors::AmqpError;
use std::future::Future;
use tracing::{debug, error};

/// Invokes `method` on `target`, awaiting the transport future.
pub(crate) async fn call<T, F>(
    target: &str,
    method: &'static str,
    fut: F,
) -> Result<T, AmqpError>
where
    F: Future<Output = Result<T, AmqpError>>,
{
    debug!(target_name = target, method, "calling");

    let result = fut.await;
    match &result {
        Ok(_) => debug!(target_name = target, method, "called"),
        Err(err) => debug!(
            target_name = target,
            method,
            error = err.to_string(),
            "call failed"
        ),
    }

    result
}

/// Maps a lapin error to the crate taxonomy.
///
/// Errors that are neither about the channel nor the connection become `fallback`.
pub(crate) fn normalize(
    err: lapin::Error,
    fallback: impl FnOnce(&lapin::Error) -> AmqpError,
) -> AmqpError {
    error!(error = err.to_string(), "amqp transport failure");

    match err {
        lapin::Error::InvalidChannel(_) | lapin::Error::InvalidChannelState(_) => {
            AmqpError::ChannelClosed
        }
        lapin::Error::InvalidConnectionState(_)
        | lapin::Error::IOError(_)
        | lapin::Error::MissingHeartbeatError => AmqpError::ConnectionLost,
        other => fallback(&other),
    }
}
