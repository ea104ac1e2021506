// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Explicit engine context.

use crate::config::EngineConfig;
use crate::datatype::Datatype;
use crate::error::Result;
use crate::metrics::DatatypeMetrics;
use crate::structured::{MemberDesc, StructType};
use std::sync::Arc;

/// Configuration and counters shared by every datatype created through it.
///
/// Cheap to clone. Each structure keeps a clone, so counters stay reachable
/// for as long as any structure does.
#[derive(Debug, Clone)]
pub struct DatatypeContext {
    config: Arc<EngineConfig>,
    metrics: Arc<DatatypeMetrics>,
}

impl DatatypeContext {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
            metrics: Arc::new(DatatypeMetrics::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn metrics(&self) -> &DatatypeMetrics {
        &self.metrics
    }

    /// Build a structured datatype of `members` repeated `rep_count` times.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedMember`](crate::Error::UnsupportedMember) for IOV
    ///   or generic members
    /// - [`Error::RepeatedNested`](crate::Error::RepeatedNested) for a
    ///   structure member when `rep_count != 1`
    /// - [`Error::InvalidLayout`](crate::Error::InvalidLayout) for an empty
    ///   member list, zero repetitions or zero packed length
    /// - [`Error::OutOfMemory`](crate::Error::OutOfMemory)
    pub fn create_struct(&self, members: &[MemberDesc], rep_count: usize) -> Result<Datatype> {
        StructType::create(self, members, rep_count).map(Datatype::Struct)
    }

    /// Destroy a datatype handle.
    ///
    /// For a structure this deregisters every cached handle. Leaves have
    /// nothing to release.
    pub fn destroy(&self, datatype: Datatype) {
        if let Datatype::Struct(s) = datatype {
            s.destroy();
        }
    }
}

impl Default for DatatypeContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
