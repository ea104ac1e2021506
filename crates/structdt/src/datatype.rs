// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datatype handles and kind dispatch.
//!
//! A [`Datatype`] is a tagged handle: either a primitive leaf kind or a
//! structured (composite) node. Dispatch is a plain `match` on the tag, so
//! kind queries stay O(1) without any pointer tagging.
//!
//! Only contiguous leaves and structures are understood by the structured
//! engine. `Iov` and `Generic` exist so callers holding them get a
//! configuration error instead of silent misbehavior.

use crate::error::{Error, Result};
use crate::structured::StructType;
use std::sync::Arc;

/// Datatype class tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "loaders", derive(serde::Serialize))]
#[cfg_attr(feature = "loaders", serde(rename_all = "lowercase"))]
pub enum DatatypeKind {
    /// Contiguous run of fixed-size elements.
    Contig,
    /// Vector of user buffers (layout known only per buffer).
    Iov,
    /// User-defined pack/unpack callbacks.
    Generic,
    /// Nested / strided / repeated structure.
    Struct,
}

/// Contiguous leaf datatype: `count` elements of `elem_size` bytes each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContigType {
    elem_size: usize,
}

impl ContigType {
    /// Leaf of `elem_size` bytes.
    #[must_use]
    pub const fn new(elem_size: usize) -> Self {
        Self { elem_size }
    }

    /// Size of one element in bytes.
    #[must_use]
    pub const fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// Byte length of `count` elements.
    #[must_use]
    pub const fn length(&self, count: usize) -> usize {
        self.elem_size * count
    }
}

/// Tagged datatype handle.
///
/// Structures are shared through `Arc`: a member descriptor references its
/// sub-datatype without owning the structure it points to.
#[derive(Debug, Clone)]
pub enum Datatype {
    /// Contiguous leaf.
    Contig(ContigType),
    /// IOV leaf (unsupported by the structured engine).
    Iov,
    /// Generic leaf (unsupported by the structured engine).
    Generic,
    /// Structured datatype.
    Struct(Arc<StructType>),
}

impl Datatype {
    /// Contiguous leaf of `elem_size` bytes.
    #[must_use]
    pub const fn contig(elem_size: usize) -> Self {
        Self::Contig(ContigType::new(elem_size))
    }

    /// Kind tag.
    #[must_use]
    pub fn kind(&self) -> DatatypeKind {
        match self {
            Self::Contig(_) => DatatypeKind::Contig,
            Self::Iov => DatatypeKind::Iov,
            Self::Generic => DatatypeKind::Generic,
            Self::Struct(_) => DatatypeKind::Struct,
        }
    }

    /// Structured node, if this is one.
    #[must_use]
    pub fn as_struct(&self) -> Option<&Arc<StructType>> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Packed byte length of `count` instances.
    ///
    /// `None` for kinds whose length depends on the user buffer (IOV, generic).
    #[must_use]
    pub fn length(&self, count: usize) -> Option<usize> {
        match self {
            Self::Contig(c) => Some(c.length(count)),
            Self::Struct(s) => Some(s.layout().len * count),
            Self::Iov | Self::Generic => None,
        }
    }

    /// Memory footprint of one instance in bytes.
    #[must_use]
    pub fn extent(&self) -> Option<usize> {
        match self {
            Self::Contig(c) => Some(c.elem_size()),
            Self::Struct(s) => Some(s.layout().extent),
            Self::Iov | Self::Generic => None,
        }
    }

    /// Offset of the lowest byte touched by one instance, relative to its base.
    #[must_use]
    pub fn low_bound(&self) -> Option<isize> {
        match self {
            Self::Contig(_) => Some(0),
            Self::Struct(s) => Some(s.layout().lb_displ),
            Self::Iov | Self::Generic => None,
        }
    }
}

impl From<ContigType> for Datatype {
    fn from(c: ContigType) -> Self {
        Self::Contig(c)
    }
}

impl From<Arc<StructType>> for Datatype {
    fn from(s: Arc<StructType>) -> Self {
        Self::Struct(s)
    }
}

/// Pack `length` bytes of `src` (laid out as `dt`), starting at packed
/// offset `offset`, into the front of `dest`.
///
/// Returns the number of bytes copied.
pub fn pack(dt: &Datatype, dest: &mut [u8], src: &[u8], offset: usize, length: usize) -> Result<usize> {
    match dt {
        Datatype::Contig(_) => {
            dest[..length].copy_from_slice(&src[offset..offset + length]);
            Ok(length)
        }
        Datatype::Struct(s) => Ok(s.gather(dest, src, length, offset)),
        Datatype::Iov | Datatype::Generic => Err(Error::Unsupported(dt.kind())),
    }
}

/// Unpack `length` bytes from the front of `src` into `dest` (laid out as
/// `dt`), starting at packed offset `offset`.
///
/// Returns the number of bytes copied.
pub fn unpack(dt: &Datatype, dest: &mut [u8], src: &[u8], offset: usize, length: usize) -> Result<usize> {
    match dt {
        Datatype::Contig(_) => {
            dest[offset..offset + length].copy_from_slice(&src[..length]);
            Ok(length)
        }
        Datatype::Struct(s) => Ok(s.scatter(dest, src, length, offset)),
        Datatype::Iov | Datatype::Generic => Err(Error::Unsupported(dt.kind())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contig_queries() {
        let dt = Datatype::contig(8);
        assert_eq!(dt.kind(), DatatypeKind::Contig);
        assert_eq!(dt.length(4), Some(32));
        assert_eq!(dt.extent(), Some(8));
        assert_eq!(dt.low_bound(), Some(0));
        assert!(dt.as_struct().is_none());
    }

    #[test]
    fn test_unsupported_kinds_have_no_layout() {
        for dt in [Datatype::Iov, Datatype::Generic] {
            assert_eq!(dt.length(1), None);
            assert_eq!(dt.extent(), None);
            assert_eq!(dt.low_bound(), None);
        }
    }

    #[test]
    fn test_contig_pack_unpack_with_offset() {
        let dt = Datatype::contig(1);
        let src: Vec<u8> = (0..16).collect();
        let mut packed = [0u8; 4];
        assert_eq!(pack(&dt, &mut packed, &src, 6, 4).unwrap(), 4);
        assert_eq!(packed, [6, 7, 8, 9]);

        let mut out = [0u8; 16];
        assert_eq!(unpack(&dt, &mut out, &packed, 6, 4).unwrap(), 4);
        assert_eq!(&out[6..10], &[6, 7, 8, 9]);
        assert_eq!(out[5], 0);
    }

    #[test]
    fn test_generic_pack_rejected() {
        let mut dest = [0u8; 4];
        let err = pack(&Datatype::Generic, &mut dest, &[0u8; 4], 0, 4).unwrap_err();
        assert!(matches!(err, Error::Unsupported(DatatypeKind::Generic)));
    }
}
