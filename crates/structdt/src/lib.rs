// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # structdt - structured datatypes for zero-copy messaging
//!
//! Describes non-contiguous application memory (nested, strided, repeated
//! composite structures), converts between that layout and a linear byte
//! stream, and registers the whole pattern with a remote-memory capable
//! transport as a single handle.
//!
//! ## Quick Start
//!
//! ```rust
//! use structdt::{DatatypeContext, MemberDesc, Result};
//!
//! fn main() -> Result<()> {
//!     let ctx = DatatypeContext::default();
//!
//!     // 3 x { u32 at 0 (stride 4), [u8; 8] at 4 (stride 12) }
//!     let dt = ctx.create_struct(
//!         &[MemberDesc::contig(4, 0, 4), MemberDesc::contig(8, 4, 12)],
//!         3,
//!     )?;
//!     let s = dt.as_struct().expect("struct");
//!     assert_eq!(s.layout().len, 36);
//!
//!     let memory = vec![0u8; s.layout().extent];
//!     let mut wire = [0u8; 8];
//!     s.gather(&mut wire, &memory, 8, 16);
//!
//!     ctx.destroy(dt);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------------------------------+
//! |  DatatypeContext (config + metrics)                         |
//! +-------------------------------------------------------------+
//! |  StructType: members -> Layout (computed once)              |
//! |     locate(offset)      gather / scatter (pack / unpack)    |
//! +-------------------------------------------------------------+
//! |  reg: recursive registrar -> HandleCache (teardown)         |
//! |     MemoryDomain | Endpoint lanes | Completion              |
//! +-------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`structured`] - structure descriptors, layout, offset lookup, copy
//! - [`datatype`] - datatype handles and generic pack/unpack dispatch
//! - [`reg`] - non-contiguous registration and the handle cache
//! - [`sync`] - reentrant spinlock for callers serializing registration
//! - [`loaders`] - YAML layout files (feature `loaders`)

/// Engine configuration (logging level, completion awaiting).
pub mod config;
/// Explicit context every structure is created from.
pub mod context;
/// Datatype handles, kinds and generic pack/unpack.
pub mod datatype;
/// Error type and taxonomy.
pub mod error;
/// YAML layout files.
#[cfg(feature = "loaders")]
pub mod loaders;
/// Engine counters.
pub mod metrics;
/// Non-contiguous memory registration.
pub mod reg;
/// Structured datatype descriptors.
pub mod structured;
/// Reentrant spinlock and lock profiling.
pub mod sync;

pub use config::EngineConfig;
pub use context::DatatypeContext;
pub use datatype::{pack, unpack, ContigType, Datatype, DatatypeKind};
pub use error::{Error, ErrorClass, Result};
#[cfg(feature = "loaders")]
pub use loaders::{LayoutLoader, LayoutSet};
pub use metrics::{DatatypeMetrics, MetricsSnapshot, StructStats};
pub use reg::{HandleCache, MemHandle, MemoryDomain, StructRegistration};
pub use structured::{Layout, MemberDesc, Position, StructType};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
