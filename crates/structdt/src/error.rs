// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error type shared by construction, registration and layout loading.
//!
//! Misuse of the pack/unpack hot path (offsets or lengths outside the
//! structure, copied-length mismatch) is not represented here: those are
//! caller bugs and fail fast through assertions.

use crate::datatype::DatatypeKind;
use crate::reg::TransportStatus;
use thiserror::Error;

/// Coarse error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Unsupported member kind or illegal nesting; the object never exists.
    Configuration,
    /// Allocation failure; nothing partially built stays reachable.
    Resource,
    /// Registration rejected by the transport / memory-domain collaborator.
    Transport,
}

/// Errors returned by structdt entry points.
#[derive(Debug, Error)]
pub enum Error {
    /// Member kind the structured engine does not implement (IOV, generic).
    #[error("member {index}: {kind:?} datatypes are not supported inside a structure")]
    UnsupportedMember { index: usize, kind: DatatypeKind },

    /// Nested structure under an enclosing repetition count other than 1.
    #[error("member {index}: nested structure cannot be repeated (enclosing rep_count {rep_count})")]
    RepeatedNested { index: usize, rep_count: usize },

    /// Degenerate layout (no members, zero repetitions, ...).
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    /// Operation not implemented for this datatype kind.
    #[error("operation not implemented for {0:?} datatypes")]
    Unsupported(DatatypeKind),

    /// Allocation failure for descriptor, member array or scratch entries.
    #[error("out of memory")]
    OutOfMemory,

    /// Registration rejected by the collaborator.
    #[error("registration failed: {status}")]
    Transport { status: TransportStatus },

    /// Endpoint has no such lane.
    #[error("endpoint has no lane {0}")]
    UnknownLane(u8),

    /// Layout file could not be read or resolved.
    #[cfg(feature = "loaders")]
    #[error("layout loader: {0}")]
    Loader(String),
}

impl Error {
    /// Map this error onto the taxonomy.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnsupportedMember { .. }
            | Self::RepeatedNested { .. }
            | Self::InvalidLayout(_)
            | Self::Unsupported(_) => ErrorClass::Configuration,
            #[cfg(feature = "loaders")]
            Self::Loader(_) => ErrorClass::Configuration,
            Self::OutOfMemory => ErrorClass::Resource,
            Self::Transport { .. } | Self::UnknownLane(_) => ErrorClass::Transport,
        }
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

impl From<TransportStatus> for Error {
    fn from(status: TransportStatus) -> Self {
        Self::Transport { status }
    }
}

/// Convenient alias for structdt results.
pub type Result<T> = std::result::Result<T, Error>;
