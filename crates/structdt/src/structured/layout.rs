// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Layout derivation for structured datatypes.

use super::{Member, MemberType};

/// Layout fields derived once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "loaders", derive(serde::Serialize))]
pub struct Layout {
    /// Packed bytes in one repetition (no inter-repetition padding).
    pub step_len: usize,
    /// Packed bytes across all repetitions.
    pub len: usize,
    /// Span from the lowest to the highest byte touched, all repetitions included.
    pub extent: usize,
    /// Lowest touched byte relative to the structure's base.
    pub lb_displ: isize,
    /// Nesting depth (a structure of leaves has depth 1).
    pub depth: usize,
    /// Registration entries this level emits.
    pub iov_count: usize,
}

impl Layout {
    /// Derive the layout of `members` repeated `rep_count` times.
    ///
    /// The extent is the distance between the minimum low byte and the
    /// maximum high byte over all members. It is not the extent of one
    /// repetition times `rep_count`: strided members interleave, and the last
    /// repetition has no trailing stride padding.
    ///
    /// ```text
    /// member a: |xxx|...|xxx|...|xxx|
    /// member b:    |yy|..|yy|..|yy|
    /// one rep : |-----|
    /// one x 3 : |-----|-----|-----|
    /// real    : |-------------------|
    /// ```
    ///
    /// A member spans `stride * (rep_count - 1) + extent` bytes from its low
    /// byte.
    pub(crate) fn compute(members: &[Member], rep_count: usize) -> Self {
        debug_assert!(!members.is_empty() && rep_count > 0);

        let mut step_len = 0usize;
        let mut iov_count = 0usize;
        let mut child_depth = 0usize;
        // Signed arithmetic: negative displacements and low bounds need no
        // artificial base address.
        let mut low = isize::MAX;
        let mut high = isize::MIN;

        for member in members {
            match &member.ty {
                MemberType::Leaf(c) => {
                    step_len += c.elem_size();
                    iov_count += 1;
                }
                MemberType::Nested(s) => {
                    step_len += s.layout.len;
                    // A single-occurrence structure is inlined into this
                    // level; a repeated one is registered as one folded unit.
                    iov_count += if s.rep_count == 1 {
                        s.layout.iov_count
                    } else {
                        1
                    };
                    child_depth = child_depth.max(s.layout.depth);
                }
            }

            let lb = member.displacement + member.low_bound();
            let span = member.stride * (rep_count - 1) + member.extent();
            low = low.min(lb);
            high = high.max(lb + span as isize);
        }

        Self {
            step_len,
            len: step_len * rep_count,
            extent: (high - low) as usize,
            lb_displ: low,
            depth: child_depth + 1,
            iov_count,
        }
    }

    /// Displacement of byte 0 of a structured buffer: the base, or the low
    /// bound when a member sits below the base.
    #[must_use]
    pub fn buffer_origin(&self) -> isize {
        self.lb_displ.min(0)
    }

    /// Bytes a structured buffer must hold, starting at [`Self::buffer_origin`].
    #[must_use]
    pub fn buffer_span(&self) -> usize {
        self.extent + self.lb_displ.max(0).unsigned_abs()
    }
}
