// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Collaborator interfaces for non-contiguous memory registration.
//!
//! The engine never talks to hardware itself. A memory domain (or a transport
//! endpoint bound to one) receives an array of [`RegIov`] entries plus a
//! repetition count and returns one [`MemHandle`] covering the whole
//! strided pattern.

use crossbeam::utils::Backoff;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Opaque registration handle issued by a memory domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemHandle(u64);

impl MemHandle {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

/// Memory domain index within a context.
pub type MdIndex = u8;

/// Domains an [`MdMap`] can hold; valid indices are `0..MAX_MDS`.
pub const MAX_MDS: usize = 64;

/// Endpoint lane index.
pub type LaneIndex = u8;

/// Bitmap of memory domains.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MdMap(u64);

impl MdMap {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Map with only `index` set.
    ///
    /// # Panics
    ///
    /// If `index` is not below [`MAX_MDS`].
    #[must_use]
    pub const fn bit(index: MdIndex) -> Self {
        assert!((index as usize) < MAX_MDS, "memory domain index out of range");
        Self(1u64 << index)
    }

    #[must_use]
    pub const fn contains(&self, index: MdIndex) -> bool {
        (index as usize) < MAX_MDS && self.0 & (1u64 << index) != 0
    }

    #[must_use]
    pub const fn bits(&self) -> u64 {
        self.0
    }
}

/// Status reported by a registration collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportStatus {
    pub code: i32,
    pub message: String,
}

impl TransportStatus {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status {})", self.message, self.code)
    }
}

/// One registration entry: a region of `length` bytes at `address`,
/// repeated every `stride` bytes, reachable through `handle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegIov {
    pub address: u64,
    pub length: usize,
    pub stride: usize,
    pub handle: MemHandle,
}

/// Memory domain able to register strided, non-contiguous regions.
pub trait MemoryDomain: Send + Sync + fmt::Debug {
    /// Domain name (for logs).
    fn name(&self) -> &str;

    /// Index of this domain in its context.
    fn index(&self) -> MdIndex;

    /// Register `iovs` repeated `rep_count` times as one handle.
    fn mem_reg_nc(&self, iovs: &[RegIov], rep_count: usize) -> Result<MemHandle, TransportStatus>;

    /// Release a handle returned by [`mem_reg_nc`](Self::mem_reg_nc).
    fn mem_dereg_nc(&self, handle: MemHandle) -> Result<(), TransportStatus>;
}

/// Transport endpoint able to register non-contiguous regions on the memory
/// domain it is bound to.
pub trait TransportEndpoint: Send + Sync + fmt::Debug {
    /// Register `iovs` repeated `rep_count` times.
    ///
    /// Returns the owning domain and the handle. The operation may finish
    /// asynchronously; `completion` is signalled when it does.
    fn mem_reg_nc(
        &self,
        iovs: &[RegIov],
        rep_count: usize,
        completion: &Completion,
    ) -> Result<(Arc<dyn MemoryDomain>, MemHandle), TransportStatus>;
}

/// One lane of an endpoint.
#[derive(Debug, Clone)]
pub struct Lane {
    pub transport: Arc<dyn TransportEndpoint>,
    pub md_index: MdIndex,
}

/// Communication endpoint with per-lane transports.
pub trait Endpoint {
    fn lane(&self, lane: LaneIndex) -> Option<Lane>;
}

/// Counter-based completion token.
///
/// Starts at `count` outstanding operations; each [`complete`](Self::complete)
/// retires one. The first failure status is kept.
#[derive(Debug)]
pub struct Completion {
    count: AtomicUsize,
    status: Mutex<Option<TransportStatus>>,
}

impl Completion {
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            count: AtomicUsize::new(count),
            status: Mutex::new(None),
        }
    }

    /// Retire one outstanding operation.
    pub fn complete(&self, result: Result<(), TransportStatus>) {
        if let Err(status) = result {
            let mut slot = self.status.lock();
            if slot.is_none() {
                *slot = Some(status);
            }
        }
        // Saturate: a spurious extra completion must not wrap around.
        let _ = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1));
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.count.load(Ordering::Acquire) == 0
    }

    /// First failure reported, if any.
    #[must_use]
    pub fn status(&self) -> Option<TransportStatus> {
        self.status.lock().clone()
    }

    /// Spin (with backoff) until done or `spin_limit` rounds elapse.
    pub(crate) fn wait(&self, spin_limit: u32) -> Result<(), TransportStatus> {
        let backoff = Backoff::new();
        let mut rounds = 0u32;
        while !self.is_done() {
            if rounds >= spin_limit {
                return Err(TransportStatus::new(
                    -1,
                    format!("registration completion not signalled after {rounds} rounds"),
                ));
            }
            backoff.snooze();
            rounds += 1;
        }
        match self.status() {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md_map_bits() {
        let map = MdMap::bit(3);
        assert!(map.contains(3));
        assert!(!map.contains(2));
        assert_eq!(map.bits(), 0b1000);
        assert_eq!(MdMap::empty().bits(), 0);
        assert_eq!(MdMap::bit(63).bits(), 1 << 63);
        assert!(!MdMap::bit(63).contains(64));
    }

    #[test]
    #[should_panic(expected = "memory domain index out of range")]
    fn test_md_map_rejects_index_past_width() {
        let _ = MdMap::bit(64);
    }

    #[test]
    fn test_completion_counts_down() {
        let comp = Completion::new(2);
        assert!(!comp.is_done());
        comp.complete(Ok(()));
        assert!(!comp.is_done());
        comp.complete(Ok(()));
        assert!(comp.is_done());
        comp.complete(Ok(()));
        assert!(comp.is_done());
        assert!(comp.wait(1).is_ok());
    }

    #[test]
    fn test_completion_keeps_first_failure() {
        let comp = Completion::new(2);
        comp.complete(Err(TransportStatus::new(-5, "first")));
        comp.complete(Err(TransportStatus::new(-6, "second")));
        let status = comp.wait(1).unwrap_err();
        assert_eq!(status.code, -5);
    }

    #[test]
    fn test_completion_wait_gives_up() {
        let comp = Completion::new(1);
        let status = comp.wait(4).unwrap_err();
        assert!(status.message.contains("not signalled"));
    }
}
