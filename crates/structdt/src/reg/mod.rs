// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Memory registration for structured datatypes.
//!
//! - [`transport`]: collaborator traits (memory domain, endpoint lanes) and
//!   completion tokens
//! - [`cache`]: per-structure handle cache used for teardown
//! - `registrar`: the recursive build-and-register walk
//! - [`loopback`]: in-process domain for tests and dry runs
//!
//! Registration is never needed for gather/scatter.

pub mod cache;
pub mod loopback;
mod registrar;
pub mod transport;

pub use cache::{HandleCache, Registration};
pub use loopback::{CompletionMode, LoopbackDomain, LoopbackEndpoint, RegRequest};
pub use registrar::StructRegistration;
pub use transport::{
    Completion, Endpoint, Lane, LaneIndex, MdIndex, MdMap, MemHandle, MemoryDomain, RegIov,
    TransportEndpoint, TransportStatus, MAX_MDS,
};

/// Base address of a buffer, as handed to the registration collaborators.
#[must_use]
pub fn address_of(buffer: &[u8]) -> u64 {
    buffer.as_ptr() as u64
}
