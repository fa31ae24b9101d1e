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
use zenoh_pico_codec::CodecError;
use zenoh_pico_link::LinkError;
use zenoh_pico_protocol::transport::CloseReason;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("link error: {0}")]
    Link(#[from] LinkError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("sequence-number discontinuity on a reliable stream")]
    SnDiscontinuity,
    #[error("peer closed the session: {0:?}")]
    ClosedByPeer(CloseReason),
    #[error("lease expired without a keep-alive or any other message")]
    LeaseExpired,
    #[error("handshake failed: {0}")]
    HandshakeFailed(&'static str),
    #[error("message size exceeds the negotiated batch size")]
    OversizedMessage,
}

pub type TransportResult<T> = Result<T, TransportError>;
