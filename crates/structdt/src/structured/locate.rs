// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Packed-offset to (repetition, member, residual) lookup.

use super::StructType;

/// Location of a packed byte offset inside a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Repetition holding the offset.
    pub rep_index: usize,
    /// Member holding the offset within that repetition.
    pub member_index: usize,
    /// Offset inside the member's packed bytes.
    pub residual: usize,
}

impl StructType {
    /// Locate packed byte `offset`.
    ///
    /// Returns `None` when `offset >= layout().len`.
    #[must_use]
    pub fn locate(&self, offset: usize) -> Option<Position> {
        let step = self.layout.step_len;
        let rep_index = offset / step;
        if rep_index >= self.rep_count {
            return None;
        }

        let mut remaining = offset % step;
        for (member_index, member) in self.members.iter().enumerate() {
            let len = member.unit_length();
            if remaining < len {
                return Some(Position {
                    rep_index,
                    member_index,
                    residual: remaining,
                });
            }
            remaining -= len;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DatatypeContext;
    use crate::structured::MemberDesc;

    #[test]
    fn test_locate_two_member_scenario() {
        let ctx = DatatypeContext::default();
        let dt = ctx
            .create_struct(&[MemberDesc::contig(4, 0, 4), MemberDesc::contig(8, 4, 12)], 3)
            .unwrap();
        let s = dt.as_struct().unwrap();

        assert_eq!(
            s.locate(0),
            Some(Position {
                rep_index: 0,
                member_index: 0,
                residual: 0
            })
        );
        assert_eq!(
            s.locate(16),
            Some(Position {
                rep_index: 1,
                member_index: 1,
                residual: 0
            })
        );
        assert_eq!(
            s.locate(35),
            Some(Position {
                rep_index: 2,
                member_index: 1,
                residual: 7
            })
        );
        assert_eq!(s.locate(36), None);
        assert_eq!(s.locate(usize::MAX), None);
    }

    #[test]
    fn test_locate_is_total_over_packed_range() {
        let ctx = DatatypeContext::default();
        let inner = ctx.create_struct(&[MemberDesc::contig(3, 0, 5)], 2).unwrap();
        let dt = ctx
            .create_struct(
                &[
                    MemberDesc::contig(1, 0, 0),
                    MemberDesc::new(inner, 4, 0),
                    MemberDesc::contig(0, 20, 0),
                    MemberDesc::contig(2, 24, 0),
                ],
                1,
            )
            .unwrap();
        let s = dt.as_struct().unwrap();
        let lens = [1usize, 6, 0, 2];

        for offset in 0..s.layout().len {
            let pos = s.locate(offset).expect("offset inside structure");
            let start: usize = pos.rep_index * s.layout().step_len
                + lens[..pos.member_index].iter().sum::<usize>();
            assert!(pos.residual < lens[pos.member_index]);
            assert_eq!(start + pos.residual, offset);
        }
        assert_eq!(s.locate(s.layout().len), None);
    }
}
