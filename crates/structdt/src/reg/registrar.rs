// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recursive non-contiguous registration.
//!
//! A structure placed at `buffer` is described to the collaborator as one
//! [`RegIov`] per leaf member, all pointing at the caller's contiguous
//! handle. A nested structure that occurs once is spliced in place. A nested
//! structure repeated more than once is registered on its own first and then
//! appears as a single entry carrying the handle it got back:
//!
//! ```text
//! outer (rep 1)
//! ├── leaf a            -> {buf + disp(a), len(a), stride(a), contig}
//! ├── inner (rep 1)     -> entries of inner, in place
//! └── column (rep 4)    -> register(column) = h
//!                          {buf + disp(col), len(column), stride(col), h}
//! ```
//!
//! A failure anywhere aborts the whole attempt. Handles already obtained for
//! folded nested structures are released before the error is returned, and
//! nothing is cached.

use super::cache::Registration;
use super::transport::{
    Completion, Endpoint, Lane, LaneIndex, MdMap, MemHandle, MemoryDomain, RegIov,
};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::structured::{MemberType, StructType};
use std::sync::Arc;

/// Result of a successful top-level registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructRegistration {
    /// Memory domain(s) owning the handle.
    pub md_map: MdMap,
    /// Handle covering the whole structure at the registered buffer.
    pub handle: MemHandle,
}

/// Where a level's entry list is sent.
trait RegTarget {
    /// Shift folded nested entries to their sub-structure's low byte.
    const APPLY_LOW_BOUND: bool;

    fn register(
        &self,
        iovs: &[RegIov],
        rep_count: usize,
    ) -> Result<(Arc<dyn MemoryDomain>, MemHandle)>;
}

struct DomainTarget<'a> {
    domain: &'a Arc<dyn MemoryDomain>,
}

impl RegTarget for DomainTarget<'_> {
    const APPLY_LOW_BOUND: bool = true;

    fn register(
        &self,
        iovs: &[RegIov],
        rep_count: usize,
    ) -> Result<(Arc<dyn MemoryDomain>, MemHandle)> {
        let handle = self.domain.mem_reg_nc(iovs, rep_count)?;
        Ok((Arc::clone(self.domain), handle))
    }
}

struct LaneTarget<'a> {
    lane: Lane,
    config: &'a EngineConfig,
}

impl RegTarget for LaneTarget<'_> {
    const APPLY_LOW_BOUND: bool = false;

    fn register(
        &self,
        iovs: &[RegIov],
        rep_count: usize,
    ) -> Result<(Arc<dyn MemoryDomain>, MemHandle)> {
        let completion = Completion::new(1);
        let (domain, handle) = self.lane.transport.mem_reg_nc(iovs, rep_count, &completion)?;
        if !self.config.await_completion {
            return Ok((domain, handle));
        }

        if let Err(status) = completion.wait(self.config.completion_spin_limit) {
            if let Err(e) = domain.mem_dereg_nc(handle) {
                log::warn!(
                    "[structdt::reg] dereg of incomplete memh {:#x} failed: {}",
                    handle.raw(),
                    e
                );
            }
            return Err(status.into());
        }
        Ok((domain, handle))
    }
}

impl StructType {
    /// Register the structure placed at `buffer` directly on a memory domain.
    ///
    /// `contig` must cover the contiguous memory backing the whole buffer.
    /// The resulting handle is cached under `buffer` until the structure is
    /// destroyed; registering the same buffer again registers again.
    pub fn register_on_domain(
        &self,
        domain: &Arc<dyn MemoryDomain>,
        buffer: u64,
        contig: MemHandle,
    ) -> Result<StructRegistration> {
        log::log!(
            self.context().config().lifecycle_level(),
            "[structdt::reg] register struct on md {}: buf {:#x}, len {}",
            domain.name(),
            buffer,
            self.layout().len
        );
        self.register_with(
            &DomainTarget { domain },
            buffer,
            contig,
            MdMap::bit(domain.index()),
        )
    }

    /// Register the structure placed at `buffer` through one lane of an
    /// endpoint.
    ///
    /// One call covers one lane: the returned map has only that lane's
    /// domain bit and `handle` is the handle for that lane. Registering on
    /// several lanes takes one call per lane, each cached separately.
    ///
    /// Same caching rules as [`register_on_domain`](Self::register_on_domain).
    /// The completion token is only awaited when
    /// [`EngineConfig::await_completion`] is set.
    pub fn register_on_endpoint(
        &self,
        endpoint: &dyn Endpoint,
        lane: LaneIndex,
        buffer: u64,
        contig: MemHandle,
    ) -> Result<StructRegistration> {
        let lane_info = endpoint.lane(lane).ok_or(Error::UnknownLane(lane))?;
        let md_map = MdMap::bit(lane_info.md_index);
        log::log!(
            self.context().config().lifecycle_level(),
            "[structdt::reg] register struct on lane {}: buf {:#x}, len {}",
            lane,
            buffer,
            self.layout().len
        );
        let target = LaneTarget {
            lane: lane_info,
            config: self.context().config(),
        };
        self.register_with(&target, buffer, contig, md_map)
    }

    fn register_with<T: RegTarget>(
        &self,
        target: &T,
        buffer: u64,
        contig: MemHandle,
        md_map: MdMap,
    ) -> Result<StructRegistration> {
        let metrics = self.context().metrics();

        let registration = match register_rec(self, target, buffer, contig) {
            Ok(r) => r,
            Err(e) => {
                log::error!("[structdt::reg] failed to register NC memh: {}", e);
                metrics.inc_registration_failures();
                return Err(e);
            }
        };
        let handle = registration.handle();

        match self.cache().insert(buffer, registration) {
            Ok(existed) => {
                self.stats().inc_create();
                if existed {
                    self.stats().inc_reuse();
                }
                metrics.inc_registrations();
                metrics.inc_cache_entries();
                Ok(StructRegistration { md_map, handle })
            }
            Err((e, registration)) => {
                let released = registration.release();
                metrics.add_deregistrations(released as u64);
                metrics.inc_registration_failures();
                log::error!("[structdt::reg] cannot cache memh {:#x}: {}", handle.raw(), e);
                Err(e)
            }
        }
    }
}

/// `base` moved by a signed byte displacement.
fn offset_addr(base: u64, displacement: isize) -> u64 {
    base.wrapping_add_signed(displacement as i64)
}

/// Build the entry list of `s` at `base` and register it as one handle.
fn register_rec<T: RegTarget>(
    s: &StructType,
    target: &T,
    base: u64,
    contig: MemHandle,
) -> Result<Registration> {
    let mut iovs = Vec::new();
    iovs.try_reserve_exact(s.layout().iov_count)?;
    let mut nested = Vec::new();

    let result = fill_iovs(s, target, base, contig, &mut iovs, &mut nested).and_then(|()| {
        debug_assert_eq!(iovs.len(), s.layout().iov_count);
        target.register(&iovs, s.rep_count())
    });

    match result {
        Ok((domain, handle)) => {
            log::debug!(
                "[structdt::reg] md {}: {} iovs x {} -> memh {:#x}",
                domain.name(),
                iovs.len(),
                s.rep_count(),
                handle.raw()
            );
            Ok(Registration::new(domain, handle, nested))
        }
        Err(e) => {
            let released: usize = nested.into_iter().map(Registration::release).sum();
            if released > 0 {
                s.context().metrics().add_deregistrations(released as u64);
            }
            Err(e)
        }
    }
}

fn fill_iovs<T: RegTarget>(
    s: &StructType,
    target: &T,
    base: u64,
    contig: MemHandle,
    iovs: &mut Vec<RegIov>,
    nested: &mut Vec<Registration>,
) -> Result<()> {
    for member in s.members() {
        let at = offset_addr(base, member.displacement);
        match &member.ty {
            MemberType::Leaf(c) => iovs.push(RegIov {
                address: at,
                length: c.elem_size(),
                stride: member.stride,
                handle: contig,
            }),
            MemberType::Nested(inner) if inner.rep_count() == 1 => {
                fill_iovs(inner, target, at, contig, iovs, nested)?;
            }
            MemberType::Nested(inner) => {
                nested.try_reserve(1)?;
                let folded = register_rec(inner, target, at, contig)?;
                let address = if T::APPLY_LOW_BOUND {
                    offset_addr(at, inner.layout().lb_displ)
                } else {
                    at
                };
                iovs.push(RegIov {
                    address,
                    length: inner.layout().len,
                    stride: member.stride,
                    handle: folded.handle(),
                });
                nested.push(folded);
            }
        }
    }
    Ok(())
}
