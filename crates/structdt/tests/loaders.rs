// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Layout file integration tests

#![cfg(feature = "loaders")]

mod common;

use common::pattern;
use std::io::Write;
use structdt::{DatatypeContext, EngineConfig, Error, LayoutLoader};
use tempfile::NamedTempFile;

const LAYOUT: &str = r#"
engine:
  verbose: true
types:
  - name: pair
    struct:
      members:
        - { contig: 2, displacement: 0 }
        - { contig: 4, displacement: 4 }
  - name: column
    struct:
      repeat: 4
      members:
        - { contig: 3, displacement: 0, stride: 16 }
  - name: record
    struct:
      members:
        - { contig: 8, displacement: 0 }
        - { type: pair, displacement: 8 }
        - { type: column, displacement: 20 }
        - { contig: 1, displacement: 90 }
"#;

fn write_layout(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tempfile");
    file.write_all(content.as_bytes()).expect("write layout");
    file
}

#[test]
fn test_load_from_file_matches_programmatic() {
    let file = write_layout(LAYOUT);
    let doc = LayoutLoader::parse_file(file.path()).unwrap();
    let ctx = DatatypeContext::new(doc.engine.clone().unwrap_or_default());
    assert!(ctx.config().verbose);

    let set = LayoutLoader::build(&ctx, &doc).unwrap();
    assert_eq!(set.len(), 3);
    let loaded = set.get("record").unwrap().as_struct().unwrap();

    let built = common::nested_scenario(&ctx);
    let built = built.as_struct().unwrap();
    assert_eq!(loaded.layout(), built.layout());

    let src = pattern(loaded.layout().extent);
    let mut a = vec![0u8; loaded.layout().len];
    let mut b = vec![0u8; built.layout().len];
    let (a_len, b_len) = (a.len(), b.len());
    loaded.gather(&mut a, &src, a_len, 0);
    built.gather(&mut b, &src, b_len, 0);
    assert_eq!(a, b);
}

#[test]
fn test_from_file_uses_given_context() {
    let file = write_layout(LAYOUT);
    let ctx = DatatypeContext::new(EngineConfig::default());
    let set = LayoutLoader::from_file(&ctx, file.path()).unwrap();
    assert!(!ctx.config().verbose);
    assert_eq!(ctx.metrics().snapshot().structs_created, 3);
    set.destroy(&ctx);
    assert_eq!(ctx.metrics().snapshot().structs_destroyed, 3);
}

#[test]
fn test_repeated_nested_rejected_from_file() {
    let file = write_layout(
        "types:\n  - name: inner\n    struct:\n      members:\n        - { contig: 4 }\n  - name: outer\n    struct:\n      repeat: 2\n      members:\n        - { type: inner, stride: 4 }\n",
    );
    let ctx = DatatypeContext::default();
    let err = LayoutLoader::from_file(&ctx, file.path()).unwrap_err();
    assert!(matches!(err, Error::RepeatedNested { index: 0, rep_count: 2 }));
}

#[test]
fn test_missing_file() {
    let ctx = DatatypeContext::default();
    let err = LayoutLoader::from_file(&ctx, "/nonexistent/structdt/layout.yaml").unwrap_err();
    assert!(matches!(err, Error::Loader(ref m) if m.contains("failed to read")));
}
