// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Offset-seeking gather (pack) and scatter (unpack).
//!
//! Both directions share one walk: seek the starting member with
//! [`StructType::locate`], then visit members and repetitions in order,
//! handing each contiguous run to a copy callback. Every call reseeks from
//! the start of the structure; there is no cursor carried between calls.
//!
//! A structured buffer starts at the structure's base, or at its lowest byte
//! when the low bound is negative. See [`super::Layout::buffer_origin`].
//!
//! Offsets and lengths are trusted. Asking for bytes outside the structure,
//! or a structured buffer too short for the layout, is a caller bug and
//! panics.

use super::{MemberType, StructType};

/// One contiguous run: structured-buffer position, linear-buffer position, length.
type CopyRun<'a> = dyn FnMut(usize, usize, usize) + 'a;

impl StructType {
    /// Pack `length` bytes starting at packed `offset` from the structured
    /// buffer `src` into the front of `dest`.
    ///
    /// `src` starts at [`Layout::buffer_origin`](super::Layout::buffer_origin).
    /// Returns the number of bytes copied, which is always `length`.
    ///
    /// # Panics
    ///
    /// If `offset + length` exceeds the packed length or a buffer is too short.
    pub fn gather(&self, dest: &mut [u8], src: &[u8], length: usize, offset: usize) -> usize {
        if length == 0 {
            return 0;
        }
        let copied = walk(self, self.base_position(), 0, offset, length, &mut |at, linear, n| {
            dest[linear..linear + n].copy_from_slice(&src[at..at + n]);
        });
        assert_eq!(
            copied, length,
            "gather: offset {offset} + length {length} outside packed length {}",
            self.layout.len
        );
        self.ctx.metrics().add_gathered(copied);
        copied
    }

    /// Unpack `length` bytes from the front of `src` into the structured
    /// buffer `dest`, starting at packed `offset`.
    ///
    /// `dest` starts at [`Layout::buffer_origin`](super::Layout::buffer_origin).
    /// Returns the number of bytes copied, which is always `length`.
    ///
    /// # Panics
    ///
    /// If `offset + length` exceeds the packed length or a buffer is too short.
    pub fn scatter(&self, dest: &mut [u8], src: &[u8], length: usize, offset: usize) -> usize {
        if length == 0 {
            return 0;
        }
        let copied = walk(self, self.base_position(), 0, offset, length, &mut |at, linear, n| {
            dest[at..at + n].copy_from_slice(&src[linear..linear + n]);
        });
        assert_eq!(
            copied, length,
            "scatter: offset {offset} + length {length} outside packed length {}",
            self.layout.len
        );
        self.ctx.metrics().add_scattered(copied);
        copied
    }

    /// Structured-buffer position of displacement 0.
    fn base_position(&self) -> isize {
        -self.layout.buffer_origin()
    }
}

/// Walk `s` placed at `base` in the structured buffer, starting at packed
/// `offset`, for at most `length` bytes. `linear` is the linear-buffer
/// position of the first byte.
///
/// Returns the bytes visited; fewer than `length` when the structure ends
/// first (a nested call stops at its own end and the caller continues).
fn walk(
    s: &StructType,
    base: isize,
    linear: usize,
    offset: usize,
    mut length: usize,
    copy: &mut CopyRun<'_>,
) -> usize {
    let Some(start) = s.locate(offset) else {
        return 0;
    };

    let mut rep_index = start.rep_index;
    let mut member_index = start.member_index;
    let mut residual = start.residual;
    let mut done = 0usize;

    while length > 0 && rep_index < s.rep_count {
        let member = &s.members[member_index];
        let at = base + member.displacement_at(rep_index);

        let copied = match &member.ty {
            MemberType::Leaf(c) => {
                let n = (c.elem_size() - residual).min(length);
                if n > 0 {
                    let pos = at + residual as isize;
                    debug_assert!(pos >= 0, "member below the buffer origin ({pos})");
                    copy(pos as usize, linear + done, n);
                }
                n
            }
            MemberType::Nested(inner) => walk(inner, at, linear + done, residual, length, copy),
        };

        done += copied;
        length -= copied;
        // Only the first member visited starts mid-way.
        residual = 0;
        member_index += 1;
        if member_index == s.members.len() {
            member_index = 0;
            rep_index += 1;
        }
    }

    done
}

#[cfg(test)]
mod tests {
    use crate::context::DatatypeContext;
    use crate::datatype::Datatype;
    use crate::structured::MemberDesc;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    fn scenario(ctx: &DatatypeContext) -> Datatype {
        ctx.create_struct(&[MemberDesc::contig(4, 0, 4), MemberDesc::contig(8, 4, 12)], 3)
            .unwrap()
    }

    #[test]
    fn test_gather_partial_from_offset() {
        let ctx = DatatypeContext::default();
        let dt = scenario(&ctx);
        let s = dt.as_struct().unwrap();
        let src = pattern(36);

        let mut dest = [0xAAu8; 12];
        assert_eq!(s.gather(&mut dest, &src, 8, 16), 8);
        // Member 1 of repetition 1 sits at 4 + 12 * 1 = 16.
        assert_eq!(&dest[..8], &src[16..24]);
        assert_eq!(&dest[8..], &[0xAA; 4]);
    }

    #[test]
    fn test_gather_full_order() {
        let ctx = DatatypeContext::default();
        let dt = scenario(&ctx);
        let s = dt.as_struct().unwrap();
        let src = pattern(36);

        let mut dest = vec![0u8; 36];
        assert_eq!(s.gather(&mut dest, &src, 36, 0), 36);

        let mut expected = Vec::new();
        for rep in 0..3 {
            expected.extend_from_slice(&src[4 * rep..4 * rep + 4]);
            expected.extend_from_slice(&src[4 + 12 * rep..12 + 12 * rep]);
        }
        assert_eq!(dest, expected);
    }

    #[test]
    fn test_gather_mid_member_start() {
        let ctx = DatatypeContext::default();
        let dt = scenario(&ctx);
        let s = dt.as_struct().unwrap();
        let src = pattern(36);

        // Offset 6 is byte 2 of member 1 in repetition 0; run into repetition 1.
        let mut dest = [0u8; 10];
        assert_eq!(s.gather(&mut dest, &src, 10, 6), 10);
        assert_eq!(&dest[..6], &src[6..12]);
        assert_eq!(&dest[6..10], &src[4..8]);
    }

    #[test]
    fn test_scatter_partial_touches_only_range() {
        let ctx = DatatypeContext::default();
        let dt = ctx
            .create_struct(&[MemberDesc::contig(2, 0, 6), MemberDesc::contig(2, 3, 6)], 4)
            .unwrap();
        let s = dt.as_struct().unwrap();

        let packed = [1u8, 2, 3, 4, 5];
        let mut dest = vec![0u8; s.layout().extent];
        // Packed offset 3 = byte 1 of member 1, repetition 0.
        assert_eq!(s.scatter(&mut dest, &packed, 5, 3), 5);

        let mut expected = vec![0u8; s.layout().extent];
        expected[4] = 1; // m1 rep0 [3, 5), residual 1
        expected[6] = 2; // m0 rep1 [6, 8)
        expected[7] = 3;
        expected[9] = 4; // m1 rep1 [9, 11)
        expected[10] = 5;
        assert_eq!(dest, expected);
    }

    #[test]
    fn test_nested_repeated_member_round_trip() {
        let ctx = DatatypeContext::default();
        let column = ctx.create_struct(&[MemberDesc::contig(2, 0, 8)], 3).unwrap();
        let dt = ctx
            .create_struct(
                &[
                    MemberDesc::contig(4, 0, 0),
                    MemberDesc::new(column, 4, 0),
                    MemberDesc::contig(1, 30, 0),
                ],
                1,
            )
            .unwrap();
        let s = dt.as_struct().unwrap();
        assert_eq!(s.layout().len, 4 + 6 + 1);

        let src = pattern(32);
        let mut packed = vec![0u8; s.layout().len];
        let packed_len = packed.len();
        assert_eq!(s.gather(&mut packed, &src, packed_len, 0), 11);
        let expected: Vec<u8> = [&src[0..4], &src[4..6], &src[12..14], &src[20..22], &src[30..31]]
            .concat();
        assert_eq!(packed, expected);

        // Chunked unpack lands every byte where a single call would.
        let mut out = vec![0u8; 32];
        let mut offset = 0;
        for chunk in packed.chunks(3) {
            assert_eq!(s.scatter(&mut out, chunk, chunk.len(), offset), chunk.len());
            offset += chunk.len();
        }
        for range in [0..6, 12..14, 20..22, 30..31] {
            assert_eq!(&out[range.clone()], &src[range]);
        }
        assert_eq!(&out[6..12], &[0u8; 6]);
    }

    #[test]
    fn test_negative_displacement_round_trip() {
        let ctx = DatatypeContext::default();
        let dt = ctx
            .create_struct(&[MemberDesc::contig(4, -8, 0), MemberDesc::contig(4, 0, 0)], 1)
            .unwrap();
        let s = dt.as_struct().unwrap();
        assert_eq!(s.layout().buffer_span(), 12);

        // Byte 0 of the buffer is displacement -8.
        let src = pattern(12);
        let mut packed = [0u8; 8];
        assert_eq!(s.gather(&mut packed, &src, 8, 0), 8);
        assert_eq!(&packed[..4], &src[0..4]);
        assert_eq!(&packed[4..], &src[8..12]);

        let mut out = vec![0u8; 12];
        assert_eq!(s.scatter(&mut out, &packed[2..], 6, 2), 6);
        assert_eq!(s.scatter(&mut out, &packed[..2], 2, 0), 2);
        assert_eq!(&out[0..4], &src[0..4]);
        assert_eq!(&out[4..8], &[0u8; 4]);
        assert_eq!(&out[8..12], &src[8..12]);
    }

    #[test]
    fn test_nested_negative_low_bound_round_trip() {
        let ctx = DatatypeContext::default();
        let inner = ctx
            .create_struct(&[MemberDesc::contig(2, -4, 6), MemberDesc::contig(2, 0, 6)], 3)
            .unwrap();
        let dt = ctx
            .create_struct(&[MemberDesc::contig(1, 0, 0), MemberDesc::new(inner, 2, 0)], 1)
            .unwrap();
        let s = dt.as_struct().unwrap();
        assert_eq!(s.layout().lb_displ, -2);
        assert_eq!(s.layout().buffer_span(), 18);
        assert_eq!(s.layout().len, 13);

        // Buffer position = displacement + 2.
        let src = pattern(18);
        let mut packed = vec![0u8; 13];
        assert_eq!(s.gather(&mut packed, &src, 13, 0), 13);
        let expected: Vec<u8> = [
            &src[2..3],
            &src[0..2],
            &src[4..6],
            &src[6..8],
            &src[10..12],
            &src[12..14],
            &src[16..18],
        ]
        .concat();
        assert_eq!(packed, expected);

        let mut out = vec![0u8; 18];
        let mut offset = 0;
        for chunk in packed.chunks(4) {
            assert_eq!(s.scatter(&mut out, chunk, chunk.len(), offset), chunk.len());
            offset += chunk.len();
        }
        for range in [0..3, 4..8, 10..14, 16..18] {
            assert_eq!(&out[range.clone()], &src[range]);
        }
        for gap in [3, 8, 9, 14, 15] {
            assert_eq!(out[gap], 0);
        }
    }

    #[test]
    fn test_metrics_count_bytes() {
        let ctx = DatatypeContext::default();
        let dt = scenario(&ctx);
        let s = dt.as_struct().unwrap();
        let src = pattern(36);
        let mut packed = [0u8; 36];
        s.gather(&mut packed, &src, 20, 0);
        let mut out = [0u8; 36];
        s.scatter(&mut out, &packed, 12, 0);
        let snap = ctx.metrics().snapshot();
        assert_eq!(snap.bytes_gathered, 20);
        assert_eq!(snap.bytes_scattered, 12);
    }

    #[test]
    #[should_panic(expected = "outside packed length")]
    fn test_gather_past_end_panics() {
        let ctx = DatatypeContext::default();
        let dt = scenario(&ctx);
        let s = dt.as_struct().unwrap();
        let src = pattern(36);
        let mut dest = [0u8; 16];
        s.gather(&mut dest, &src, 8, 32);
    }

    #[test]
    fn test_zero_length_is_noop() {
        let ctx = DatatypeContext::default();
        let dt = scenario(&ctx);
        let s = dt.as_struct().unwrap();
        let mut dest = [0u8; 0];
        assert_eq!(s.gather(&mut dest, &[], 0, 36), 0);
    }
}
