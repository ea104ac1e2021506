// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared helpers for structdt integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use structdt::reg::{LoopbackDomain, MemHandle, MemoryDomain};
use structdt::{Datatype, DatatypeContext, MemberDesc};

/// Deterministic, non-repeating-ish byte pattern.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + 7) as u8).collect()
}

/// 3 x { 4 bytes at 0 (stride 4), 8 bytes at 4 (stride 12) }.
pub fn two_member_scenario(ctx: &DatatypeContext) -> Datatype {
    ctx.create_struct(&[MemberDesc::contig(4, 0, 4), MemberDesc::contig(8, 4, 12)], 3)
        .expect("create scenario")
}

/// Outer structure with an inlined nested member and a folded repeated one.
pub fn nested_scenario(ctx: &DatatypeContext) -> Datatype {
    let pair = ctx
        .create_struct(&[MemberDesc::contig(2, 0, 0), MemberDesc::contig(4, 4, 0)], 1)
        .expect("pair");
    let column = ctx
        .create_struct(&[MemberDesc::contig(3, 0, 16)], 4)
        .expect("column");
    ctx.create_struct(
        &[
            MemberDesc::contig(8, 0, 0),
            MemberDesc::new(pair, 8, 0),
            MemberDesc::new(column, 20, 0),
            MemberDesc::contig(1, 90, 0),
        ],
        1,
    )
    .expect("outer")
}

/// Loopback memory domain with a contiguous handle already covering `len`
/// bytes at `address`.
pub struct Rig {
    pub md: Arc<LoopbackDomain>,
    pub contig: MemHandle,
}

impl Rig {
    pub fn new(index: u8, address: u64, len: usize) -> Self {
        let md = Arc::new(LoopbackDomain::new(format!("lo{index}"), index));
        let contig = md.register_contig(address, len);
        Self { md, contig }
    }

    pub fn domain(&self) -> Arc<dyn MemoryDomain> {
        self.md.clone()
    }

    /// Live handles other than the contiguous one.
    pub fn live_nc(&self) -> usize {
        self.md.live_count() - 1
    }
}
