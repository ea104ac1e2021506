// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datatype engine metrics.
//!
//! Counters live in an explicitly constructed [`DatatypeMetrics`] owned by a
//! [`DatatypeContext`](crate::DatatypeContext); there is no process-wide
//! instance. All counters use `Relaxed` ordering and are eventually
//! consistent across threads.

use std::sync::atomic::{AtomicU64, Ordering};

/// Engine-wide counters.
#[derive(Debug, Default)]
pub struct DatatypeMetrics {
    structs_created: AtomicU64,
    structs_destroyed: AtomicU64,
    registrations: AtomicU64,
    registration_failures: AtomicU64,
    cache_entries: AtomicU64,
    deregistrations: AtomicU64,
    bytes_gathered: AtomicU64,
    bytes_scattered: AtomicU64,
}

/// Point-in-time copy of [`DatatypeMetrics`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub structs_created: u64,
    pub structs_destroyed: u64,
    pub registrations: u64,
    pub registration_failures: u64,
    pub cache_entries: u64,
    pub deregistrations: u64,
    pub bytes_gathered: u64,
    pub bytes_scattered: u64,
}

impl DatatypeMetrics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            structs_created: AtomicU64::new(0),
            structs_destroyed: AtomicU64::new(0),
            registrations: AtomicU64::new(0),
            registration_failures: AtomicU64::new(0),
            cache_entries: AtomicU64::new(0),
            deregistrations: AtomicU64::new(0),
            bytes_gathered: AtomicU64::new(0),
            bytes_scattered: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn inc_created(&self) {
        self.structs_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_destroyed(&self) {
        self.structs_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_registrations(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_registration_failures(&self) {
        self.registration_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_cache_entries(&self) {
        self.cache_entries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_deregistrations(&self, count: u64) {
        self.deregistrations.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_gathered(&self, bytes: usize) {
        self.bytes_gathered.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_scattered(&self, bytes: usize) {
        self.bytes_scattered.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Load every counter.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            structs_created: self.structs_created.load(Ordering::Relaxed),
            structs_destroyed: self.structs_destroyed.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            registration_failures: self.registration_failures.load(Ordering::Relaxed),
            cache_entries: self.cache_entries.load(Ordering::Relaxed),
            deregistrations: self.deregistrations.load(Ordering::Relaxed),
            bytes_gathered: self.bytes_gathered.load(Ordering::Relaxed),
            bytes_scattered: self.bytes_scattered.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.structs_created.store(0, Ordering::Relaxed);
        self.structs_destroyed.store(0, Ordering::Relaxed);
        self.registrations.store(0, Ordering::Relaxed);
        self.registration_failures.store(0, Ordering::Relaxed);
        self.cache_entries.store(0, Ordering::Relaxed);
        self.deregistrations.store(0, Ordering::Relaxed);
        self.bytes_gathered.store(0, Ordering::Relaxed);
        self.bytes_scattered.store(0, Ordering::Relaxed);
    }
}

/// Per-structure stats node.
///
/// `create` counts registrations issued against the structure; `reuse`
/// counts those whose buffer address was already cached. A reuse still
/// registers: the cache is never consulted to skip work.
#[derive(Debug, Default)]
pub struct StructStats {
    create: AtomicU64,
    reuse: AtomicU64,
}

impl StructStats {
    #[inline]
    pub(crate) fn inc_create(&self) {
        self.create.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_reuse(&self) {
        self.reuse.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn create(&self) -> u64 {
        self.create.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn reuse(&self) -> u64 {
        self.reuse.load(Ordering::Relaxed)
    }
}
