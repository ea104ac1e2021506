// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML layout files.
//!
//! Types are declared in order; a member refers to an earlier type by name or
//! declares an inline contiguous leaf.
//!
//! # Example YAML
//!
//! ```yaml
//! engine:
//!   verbose: true
//! types:
//!   - name: header
//!     contig: 4
//!   - name: row
//!     struct:
//!       repeat: 3
//!       members:
//!         - { type: header, displacement: 0, stride: 4 }
//!         - { contig: 8, displacement: 4, stride: 12 }
//!   - name: packet
//!     struct:
//!       members:
//!         - { type: row, displacement: 0 }
//!         - { contig: 2, displacement: 64 }
//! ```
//!
//! The names `iov` and `generic` are reserved and resolve to those datatype
//! kinds, so a layout using them fails the same way a programmatic
//! construction would.

use crate::config::EngineConfig;
use crate::context::DatatypeContext;
use crate::datatype::Datatype;
use crate::error::{Error, Result};
use crate::structured::MemberDesc;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Root YAML document.
#[derive(Debug, Deserialize)]
pub struct LayoutDocument {
    /// Engine settings for a context built from this file.
    #[serde(default)]
    pub engine: Option<EngineConfig>,

    /// Type declarations, in dependency order.
    #[serde(default)]
    pub types: Vec<TypeDef>,
}

/// One named type.
#[derive(Debug, Deserialize)]
pub struct TypeDef {
    pub name: String,
    /// Contiguous leaf of this many bytes.
    #[serde(default)]
    pub contig: Option<usize>,
    /// Structured type.
    #[serde(default, rename = "struct")]
    pub structure: Option<StructDef>,
}

#[derive(Debug, Deserialize)]
pub struct StructDef {
    #[serde(default = "default_repeat")]
    pub repeat: usize,
    pub members: Vec<MemberDef>,
}

fn default_repeat() -> usize {
    1
}

#[derive(Debug, Deserialize)]
pub struct MemberDef {
    /// Name of an earlier type.
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    /// Inline contiguous leaf size.
    #[serde(default)]
    pub contig: Option<usize>,
    #[serde(default)]
    pub displacement: isize,
    #[serde(default)]
    pub stride: usize,
}

/// Named datatypes built from a layout document, in declaration order.
#[derive(Debug, Default)]
pub struct LayoutSet {
    entries: Vec<(String, Datatype)>,
}

impl LayoutSet {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Datatype> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, dt)| dt)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Datatype)> {
        self.entries.iter().map(|(n, dt)| (n.as_str(), dt))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Destroy every datatype, last declared first.
    pub fn destroy(self, ctx: &DatatypeContext) {
        for (_, dt) in self.entries.into_iter().rev() {
            ctx.destroy(dt);
        }
    }
}

/// YAML layout loader.
pub struct LayoutLoader;

impl LayoutLoader {
    /// Parse a layout file without building anything.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<LayoutDocument> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Loader(format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse_str(&content)
    }

    /// Parse layout YAML without building anything.
    pub fn parse_str(yaml: &str) -> Result<LayoutDocument> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Loader(format!("failed to parse YAML: {}", e)))
    }

    /// Parse and build every type of `yaml` through `ctx`.
    ///
    /// The document's `engine` section is ignored here; `ctx` already
    /// carries a configuration.
    pub fn from_str(ctx: &DatatypeContext, yaml: &str) -> Result<LayoutSet> {
        Self::build(ctx, &Self::parse_str(yaml)?)
    }

    /// Read, parse and build a layout file through `ctx`.
    pub fn from_file<P: AsRef<Path>>(ctx: &DatatypeContext, path: P) -> Result<LayoutSet> {
        Self::build(ctx, &Self::parse_file(path)?)
    }

    /// Build the types of a parsed document.
    ///
    /// Construction errors (unsupported members, repeated nesting, degenerate
    /// layouts) are returned as-is; naming problems are [`Error::Loader`].
    pub fn build(ctx: &DatatypeContext, doc: &LayoutDocument) -> Result<LayoutSet> {
        let mut set = LayoutSet::default();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for def in &doc.types {
            if is_reserved(&def.name) {
                return Err(Error::Loader(format!("type name '{}' is reserved", def.name)));
            }
            if index.contains_key(def.name.as_str()) {
                return Err(Error::Loader(format!("duplicate type '{}'", def.name)));
            }

            let dt = match (def.contig, &def.structure) {
                (Some(size), None) => Datatype::contig(size),
                (None, Some(s)) => {
                    let mut members = Vec::new();
                    members.try_reserve_exact(s.members.len())?;
                    for (i, m) in s.members.iter().enumerate() {
                        let datatype = resolve_member(&set, &index, &def.name, i, m)?;
                        members.push(MemberDesc::new(datatype, m.displacement, m.stride));
                    }
                    ctx.create_struct(&members, s.repeat)?
                }
                _ => {
                    return Err(Error::Loader(format!(
                        "type '{}' must set exactly one of 'contig' or 'struct'",
                        def.name
                    )))
                }
            };

            log::debug!("[structdt::loaders] built type '{}' ({:?})", def.name, dt.kind());
            index.insert(def.name.as_str(), set.entries.len());
            set.entries.push((def.name.clone(), dt));
        }

        Ok(set)
    }
}

fn is_reserved(name: &str) -> bool {
    matches!(name, "iov" | "generic")
}

fn resolve_member(
    set: &LayoutSet,
    index: &HashMap<&str, usize>,
    owner: &str,
    member: usize,
    def: &MemberDef,
) -> Result<Datatype> {
    match (&def.type_name, def.contig) {
        (Some(name), None) => match name.as_str() {
            "iov" => Ok(Datatype::Iov),
            "generic" => Ok(Datatype::Generic),
            other => index
                .get(other)
                .map(|&i| set.entries[i].1.clone())
                .ok_or_else(|| {
                    Error::Loader(format!(
                        "type '{}' member {}: unknown type '{}'",
                        owner, member, other
                    ))
                }),
        },
        (None, Some(size)) => Ok(Datatype::contig(size)),
        _ => Err(Error::Loader(format!(
            "type '{}' member {}: set exactly one of 'type' or 'contig'",
            owner, member
        ))),
    }
}
