//
// Copyright (c) 2023 ZettaScale Technology
//
// This program and the accompanying materials are made available under the
// terms of the Eclipse Public License 2.0 which is available at
// http://www.eclipse.org/legal/epl-2.0, or the Apache License, Version 2.0
// which is available at https://www.apache.org/licenses/LICENSE-2.0.
//
// SPDX-License-Identifier: EPL-2.0 OR Apache-2.0
//
// Contributors:
//   ZettaScale Zenoh Team, <zenoh@zettascale.tech>
//
//! The crate-wide result type. Every crate-local error enum
//! (`zenoh_pico_codec::CodecError`, `zenoh_pico_keyexpr::CanonError`,
//! `zenoh_pico_keyexpr::KeyExprError`, `zenoh_pico_transport::TransportError`,
//! `zenoh_pico_scheduler::SchedulerError`) funnels into this one, so a
//! caller only ever matches on one set of variants regardless of which
//! layer raised it.

use thiserror::Error;

use zenoh_pico_codec::CodecError;
use zenoh_pico_keyexpr::{CanonError, KeyExprError};
use zenoh_pico_scheduler::SchedulerError;
use zenoh_pico_transport::TransportError;

#[derive(Debug, Error)]
pub enum ZError {
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("resource error: {0}")]
    Resource(String),
    #[error("entity error: {0}")]
    Entity(String),
    #[error("operation was cancelled")]
    Cancelled,
    #[error("operation timed out")]
    Timeout,
}

pub type ZResult<T> = Result<T, ZError>;

impl From<CodecError> for ZError {
    fn from(e: CodecError) -> Self {
        ZError::Protocol(e.to_string())
    }
}

impl From<CanonError> for ZError {
    fn from(e: CanonError) -> Self {
        ZError::Protocol(e.to_string())
    }
}

impl From<KeyExprError> for ZError {
    fn from(e: KeyExprError) -> Self {
        ZError::Protocol(e.to_string())
    }
}

impl From<SchedulerError> for ZError {
    fn from(e: SchedulerError) -> Self {
        ZError::Resource(e.to_string())
    }
}
