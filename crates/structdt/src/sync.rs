// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reentrant spinlock for callers serializing registration.
//!
//! The engine takes no lock of its own. A caller registering one structure
//! from several threads wraps the structure (or its own registration state)
//! in a [`ReentrantSpinlock`], or a [`ProfiledLock`] to see who takes it and
//! from where.

use crossbeam::utils::Backoff;
use parking_lot::lock_api::{self, GuardNoSend, RawMutex};
use parking_lot::{Mutex, RawThreadId};
use std::collections::{HashMap, VecDeque};
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Instant;

/// Test-and-test-and-set spinlock with exponential backoff.
#[derive(Debug)]
pub struct RawSpinlock {
    locked: AtomicBool,
}

// SAFETY: `locked` is only set by a successful acquire CAS and only cleared
// by `unlock`, which lock_api calls once per held lock.
unsafe impl RawMutex for RawSpinlock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self {
        locked: AtomicBool::new(false),
    };

    type GuardMarker = GuardNoSend;

    fn lock(&self) {
        let backoff = Backoff::new();
        while !self.try_lock() {
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        }
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

/// Spinlock the owning thread may take again without deadlocking.
///
/// Released when the outermost guard drops.
pub type ReentrantSpinlock<T> = lock_api::ReentrantMutex<RawSpinlock, RawThreadId, T>;

/// Guard for [`ReentrantSpinlock`].
pub type ReentrantSpinlockGuard<'a, T> =
    lock_api::ReentrantMutexGuard<'a, RawSpinlock, RawThreadId, T>;

/// Default number of events kept by a [`LockProfile`].
pub const DEFAULT_PROFILE_CAPACITY: usize = 1024;

/// One acquisition recorded by a [`ProfiledLock`].
#[derive(Debug, Clone)]
pub struct LockEvent {
    pub thread: ThreadId,
    pub site: &'static Location<'static>,
    /// The thread already held the lock.
    pub reentrant: bool,
    pub at: Instant,
}

/// Acquisition counts for one call site.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SiteCounts {
    pub acquired: u64,
    pub reentrant: u64,
}

/// Acquisition history shared by any number of [`ProfiledLock`]s.
///
/// Keeps the last `capacity` events plus per-site totals.
#[derive(Debug)]
pub struct LockProfile {
    capacity: usize,
    events: Mutex<VecDeque<LockEvent>>,
    sites: Mutex<HashMap<&'static Location<'static>, SiteCounts>>,
    acquisitions: AtomicU64,
}

impl LockProfile {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
            sites: Mutex::new(HashMap::new()),
            acquisitions: AtomicU64::new(0),
        }
    }

    fn record(&self, site: &'static Location<'static>, reentrant: bool) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        {
            let mut sites = self.sites.lock();
            let counts = sites.entry(site).or_default();
            counts.acquired += 1;
            if reentrant {
                counts.reentrant += 1;
            }
        }
        let mut events = self.events.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(LockEvent {
            thread: std::thread::current().id(),
            site,
            reentrant,
            at: Instant::now(),
        });
    }

    /// Total acquisitions recorded.
    #[must_use]
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// Retained events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<LockEvent> {
        self.events.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn site(&self, site: &'static Location<'static>) -> SiteCounts {
        self.sites.lock().get(site).copied().unwrap_or_default()
    }

    /// Per-site totals sorted by file and line.
    #[must_use]
    pub fn sites(&self) -> Vec<(&'static Location<'static>, SiteCounts)> {
        let mut out: Vec<_> = self.sites.lock().iter().map(|(k, v)| (*k, *v)).collect();
        out.sort_by_key(|(loc, _)| (loc.file(), loc.line(), loc.column()));
        out
    }

    pub fn clear(&self) {
        self.events.lock().clear();
        self.sites.lock().clear();
        self.acquisitions.store(0, Ordering::Relaxed);
    }
}

impl Default for LockProfile {
    fn default() -> Self {
        Self::new(DEFAULT_PROFILE_CAPACITY)
    }
}

/// [`ReentrantSpinlock`] that records every acquisition into a profile.
#[derive(Debug)]
pub struct ProfiledLock<T> {
    inner: ReentrantSpinlock<T>,
    profile: Arc<LockProfile>,
}

impl<T> ProfiledLock<T> {
    #[must_use]
    pub fn new(value: T, profile: Arc<LockProfile>) -> Self {
        Self {
            inner: ReentrantSpinlock::new(value),
            profile,
        }
    }

    #[track_caller]
    pub fn lock(&self) -> ReentrantSpinlockGuard<'_, T> {
        let reentrant = self.inner.is_owned_by_current_thread();
        let guard = self.inner.lock();
        self.profile.record(Location::caller(), reentrant);
        guard
    }

    #[track_caller]
    pub fn try_lock(&self) -> Option<ReentrantSpinlockGuard<'_, T>> {
        let reentrant = self.inner.is_owned_by_current_thread();
        let guard = self.inner.try_lock()?;
        self.profile.record(Location::caller(), reentrant);
        Some(guard)
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    #[must_use]
    pub fn profile(&self) -> &Arc<LockProfile> {
        &self.profile
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}
