// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structured (composite) datatypes.
//!
//! A [`StructType`] is an ordered list of members, each a contiguous leaf or
//! a nested structure placed at a byte displacement inside one repetition and
//! advancing by a byte stride between repetitions. The whole member list is
//! repeated `rep_count` times.
//!
//! ```text
//!  rep 0                 rep 1                 rep 2
//!  |a a a a|b b b b b b b b|a a a a|...
//!   ^disp 0 ^disp 4         ^ 0 + stride(a)
//! ```
//!
//! Layout (step length, total length, extent, low bound, depth, leaf-IOV
//! count) is derived once at construction
//! ([`DatatypeContext::create_struct`](crate::DatatypeContext::create_struct)) and never changes.
//! Gather/scatter only read that layout; registration is a separate path that
//! caches its handles for teardown.

mod copy;
mod layout;
mod locate;

pub use layout::Layout;
pub use locate::Position;

use crate::context::DatatypeContext;
use crate::datatype::{ContigType, Datatype};
use crate::error::{Error, Result};
use crate::metrics::StructStats;
use crate::reg::HandleCache;
use std::sync::Arc;

/// Member descriptor: sub-datatype, displacement within one repetition, and
/// stride between successive repetitions.
#[derive(Debug, Clone)]
pub struct MemberDesc {
    pub datatype: Datatype,
    pub displacement: isize,
    pub stride: usize,
}

impl MemberDesc {
    #[must_use]
    pub fn new(datatype: Datatype, displacement: isize, stride: usize) -> Self {
        Self {
            datatype,
            displacement,
            stride,
        }
    }

    /// Contiguous leaf member of `size` bytes.
    #[must_use]
    pub fn contig(size: usize, displacement: isize, stride: usize) -> Self {
        Self::new(Datatype::contig(size), displacement, stride)
    }
}

/// Validated member type: only the two kinds the engine walks.
#[derive(Debug)]
pub(crate) enum MemberType {
    Leaf(ContigType),
    Nested(Arc<StructType>),
}

#[derive(Debug)]
pub(crate) struct Member {
    pub(crate) ty: MemberType,
    pub(crate) displacement: isize,
    pub(crate) stride: usize,
}

impl Member {
    /// Packed bytes contributed by one repetition of the enclosing structure.
    pub(crate) fn unit_length(&self) -> usize {
        match &self.ty {
            MemberType::Leaf(c) => c.elem_size(),
            MemberType::Nested(s) => s.layout.len,
        }
    }

    fn extent(&self) -> usize {
        match &self.ty {
            MemberType::Leaf(c) => c.elem_size(),
            MemberType::Nested(s) => s.layout.extent,
        }
    }

    fn low_bound(&self) -> isize {
        match &self.ty {
            MemberType::Leaf(_) => 0,
            MemberType::Nested(s) => s.layout.lb_displ,
        }
    }

    /// Displacement of this member inside repetition `rep_index`.
    pub(crate) fn displacement_at(&self, rep_index: usize) -> isize {
        self.displacement + (self.stride * rep_index) as isize
    }
}

/// Structured datatype descriptor.
#[derive(Debug)]
pub struct StructType {
    members: Vec<Member>,
    rep_count: usize,
    layout: Layout,
    cache: HandleCache,
    stats: StructStats,
    ctx: DatatypeContext,
}

impl StructType {
    /// Validate `members`, derive the layout and build the descriptor.
    ///
    /// Members must be contiguous leaves or structures; a structure member is
    /// only accepted when `rep_count` is 1 (repetition applies at one level
    /// at a time).
    pub(crate) fn create(
        ctx: &DatatypeContext,
        members: &[MemberDesc],
        rep_count: usize,
    ) -> Result<Arc<Self>> {
        if members.is_empty() {
            return Err(Error::InvalidLayout("structure has no members".into()));
        }
        if rep_count == 0 {
            return Err(Error::InvalidLayout(
                "repetition count must be at least 1".into(),
            ));
        }

        let mut owned = Vec::new();
        owned.try_reserve_exact(members.len())?;
        for (index, desc) in members.iter().enumerate() {
            let ty = match &desc.datatype {
                Datatype::Contig(c) => MemberType::Leaf(*c),
                Datatype::Struct(s) => {
                    if rep_count != 1 {
                        return Err(Error::RepeatedNested { index, rep_count });
                    }
                    MemberType::Nested(Arc::clone(s))
                }
                other => {
                    return Err(Error::UnsupportedMember {
                        index,
                        kind: other.kind(),
                    })
                }
            };
            owned.push(Member {
                ty,
                displacement: desc.displacement,
                stride: desc.stride,
            });
        }

        let layout = Layout::compute(&owned, rep_count);
        if layout.step_len == 0 {
            return Err(Error::InvalidLayout(
                "structure has zero packed length".into(),
            ));
        }

        log::log!(
            ctx.config().lifecycle_level(),
            "[structdt] created struct: len {} (step {}), extent {}, lb {}, depth {}, iovs {}, rep_count {}",
            layout.len,
            layout.step_len,
            layout.extent,
            layout.lb_displ,
            layout.depth,
            layout.iov_count,
            rep_count
        );
        ctx.metrics().inc_created();

        Ok(Arc::new(Self {
            members: owned,
            rep_count,
            layout,
            cache: HandleCache::new(),
            stats: StructStats::default(),
            ctx: ctx.clone(),
        }))
    }

    /// Deregister every cached handle.
    ///
    /// Storage is released with the last reference; a structure still
    /// referenced as a member of another structure stays valid for
    /// gather/scatter but loses its cached registrations.
    pub fn destroy(self: Arc<Self>) {
        log::log!(
            self.ctx.config().lifecycle_level(),
            "[structdt] destroy struct: len {} (step {}), depth {}, iovs {}, cached {}",
            self.layout.len,
            self.layout.step_len,
            self.layout.depth,
            self.layout.iov_count,
            self.cache.len()
        );
        self.purge_cache();
    }

    fn purge_cache(&self) {
        let released = self.cache.purge();
        if released > 0 {
            self.ctx.metrics().add_deregistrations(released as u64);
        }
    }

    /// Derived layout.
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Number of repetitions of the member list.
    #[must_use]
    pub fn rep_count(&self) -> usize {
        self.rep_count
    }

    /// Number of members in one repetition.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Registration handle cache.
    #[must_use]
    pub fn cache(&self) -> &HandleCache {
        &self.cache
    }

    /// Per-structure registration counters.
    #[must_use]
    pub fn stats(&self) -> &StructStats {
        &self.stats
    }

    /// Context this structure was created from.
    #[must_use]
    pub fn context(&self) -> &DatatypeContext {
        &self.ctx
    }

    pub(crate) fn members(&self) -> &[Member] {
        &self.members
    }
}

impl Drop for StructType {
    fn drop(&mut self) {
        self.purge_cache();
        self.ctx.metrics().inc_destroyed();
    }
}
