// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registration handle cache.
//!
//! Write-mostly: every successful registration appends an entry under the
//! buffer address it was made for. Nothing is looked up to skip or merge a
//! later registration of the same address; the cache exists so that
//! destruction can deregister everything that was handed out.

use super::transport::{MemHandle, MemoryDomain};
use crate::error::Error;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// One registration and the folded nested registrations it was built on.
///
/// Released parent first, then children.
pub struct Registration {
    domain: Arc<dyn MemoryDomain>,
    handle: MemHandle,
    nested: Vec<Registration>,
}

impl Registration {
    pub(crate) fn new(
        domain: Arc<dyn MemoryDomain>,
        handle: MemHandle,
        nested: Vec<Registration>,
    ) -> Self {
        Self {
            domain,
            handle,
            nested,
        }
    }

    #[must_use]
    pub fn handle(&self) -> MemHandle {
        self.handle
    }

    #[must_use]
    pub fn domain(&self) -> &Arc<dyn MemoryDomain> {
        &self.domain
    }

    /// Folded nested registrations.
    #[must_use]
    pub fn nested(&self) -> &[Registration] {
        &self.nested
    }

    /// Handles in this tree (self included).
    #[must_use]
    pub fn handle_count(&self) -> usize {
        1 + self.nested.iter().map(Registration::handle_count).sum::<usize>()
    }

    /// Deregister the whole tree. Returns the number of handles released.
    pub(crate) fn release(self) -> usize {
        let mut released = 0;
        match self.domain.mem_dereg_nc(self.handle) {
            Ok(()) => {
                log::debug!(
                    "[structdt::reg] dereg memh {:#x} on md {}",
                    self.handle.raw(),
                    self.domain.name()
                );
                released += 1;
            }
            Err(status) => log::warn!(
                "[structdt::reg] dereg memh {:#x} on md {} failed: {}",
                self.handle.raw(),
                self.domain.name(),
                status
            ),
        }
        for child in self.nested {
            released += child.release();
        }
        released
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("domain", &self.domain.name())
            .field("handle", &self.handle)
            .field("nested", &self.nested)
            .finish()
    }
}

/// Registrations keyed by buffer base address.
#[derive(Debug, Default)]
pub struct HandleCache {
    entries: DashMap<u64, Vec<Registration>>,
}

impl HandleCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `registration` under `address`.
    ///
    /// Returns whether the address already had entries. On allocation
    /// failure the registration is handed back untouched.
    pub(crate) fn insert(
        &self,
        address: u64,
        registration: Registration,
    ) -> Result<bool, (Error, Registration)> {
        let mut slot = self.entries.entry(address).or_default();
        let existed = !slot.is_empty();
        if let Err(e) = slot.try_reserve(1) {
            return Err((e.into(), registration));
        }
        log::debug!(
            "[structdt::reg] cache add: buf {:#x} md {} memh {:#x}",
            address,
            registration.domain.name(),
            registration.handle.raw()
        );
        slot.push(registration);
        Ok(existed)
    }

    /// Total number of cached registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.value().len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registrations cached for `address`.
    #[must_use]
    pub fn entries_for(&self, address: u64) -> usize {
        self.entries.get(&address).map_or(0, |e| e.len())
    }

    /// Top-level handles cached for `address`, oldest first.
    #[must_use]
    pub fn handles_for(&self, address: u64) -> Vec<MemHandle> {
        self.entries
            .get(&address)
            .map(|e| e.iter().map(Registration::handle).collect())
            .unwrap_or_default()
    }

    /// Handles held across all entries, folded nested handles included.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.value().iter().map(Registration::handle_count).sum::<usize>())
            .sum()
    }

    /// Visit the registrations cached for `address`, oldest first.
    pub fn for_each_at(&self, address: u64, mut f: impl FnMut(&Registration)) {
        if let Some(entries) = self.entries.get(&address) {
            entries.iter().for_each(&mut f);
        }
    }

    /// Deregister and drop every entry. Returns the number of handles released.
    pub(crate) fn purge(&self) -> usize {
        let addresses: Vec<u64> = self.entries.iter().map(|e| *e.key()).collect();
        let mut released = 0;
        for address in addresses {
            if let Some((_, registrations)) = self.entries.remove(&address) {
                for registration in registrations {
                    released += registration.release();
                }
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::LoopbackDomain;

    #[test]
    fn test_insert_does_not_dedup() {
        let md = Arc::new(LoopbackDomain::new("lo", 0));
        let cache = HandleCache::new();
        let h1 = md.register_contig(0x1000, 64);
        let h2 = md.register_contig(0x1000, 64);

        let dyn_md: Arc<dyn MemoryDomain> = md.clone();
        assert!(!cache
            .insert(0x1000, Registration::new(dyn_md.clone(), h1, Vec::new()))
            .unwrap());
        assert!(cache
            .insert(0x1000, Registration::new(dyn_md, h2, Vec::new()))
            .unwrap());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.entries_for(0x1000), 2);
        assert_eq!(cache.handles_for(0x1000), vec![h1, h2]);
        assert_eq!(cache.entries_for(0x2000), 0);
    }

    #[test]
    fn test_purge_releases_tree_parent_first() {
        let md = Arc::new(LoopbackDomain::new("lo", 0));
        let dyn_md: Arc<dyn MemoryDomain> = md.clone();
        let child = md.register_contig(0x10, 8);
        let parent = md.register_contig(0x00, 32);
        let cache = HandleCache::new();
        cache
            .insert(
                0x00,
                Registration::new(
                    dyn_md.clone(),
                    parent,
                    vec![Registration::new(dyn_md, child, Vec::new())],
                ),
            )
            .unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.handle_count(), 2);
        let mut visited = 0;
        cache.for_each_at(0x00, |reg| {
            visited += 1;
            assert_eq!(reg.handle(), parent);
            assert_eq!(reg.handle_count(), 2);
            let nested: Vec<MemHandle> = reg.nested().iter().map(Registration::handle).collect();
            assert_eq!(nested, vec![child]);
            assert!(reg.nested()[0].nested().is_empty());
        });
        assert_eq!(visited, 1);
        cache.for_each_at(0x10, |_| panic!("nothing cached at 0x10"));

        assert_eq!(cache.purge(), 2);
        assert!(cache.is_empty());
        assert_eq!(md.deregistered(), vec![parent, child]);
        assert_eq!(md.live_count(), 0);
        assert_eq!(cache.purge(), 0);
        assert_eq!(cache.handle_count(), 0);
    }
}
