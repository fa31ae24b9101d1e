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
use thiserror::Error;

/// Why a decode failed. All variants map to spec §7's "Protocol" error
/// category: the caller drops the offending frame and keeps the session.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of buffer while decoding")]
    UnexpectedEof,
    #[error("varint would exceed 10 bytes / 64 bits")]
    VarintOverflow,
    #[error("decoded length exceeds the configured MTU bound")]
    LengthExceedsMtu,
    #[error("unknown message id {0:#04x}")]
    UnknownMessageId(u8),
    #[error("unknown mandatory extension id {0}")]
    UnknownMandatoryExtension(u8),
    #[error("malformed message body")]
    Malformed,
    #[error("zenoh id is empty or exceeds 16 bytes")]
    BadZenohId,
}

pub type CodecResult<T> = Result<T, CodecError>;
