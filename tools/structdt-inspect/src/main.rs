// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! structdt-inspect - layout file inspector
//!
//! Loads a YAML layout file and prints, per type, the derived layout. It can
//! also pack a window of a patterned buffer and dry-run a registration
//! against a loopback memory domain to show the generated entry lists.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use structdt::reg::{LoopbackDomain, MemoryDomain, RegRequest};
use structdt::{pack, Datatype, DatatypeContext, DatatypeKind, Layout, LayoutLoader};

/// Base address used for dry-run registrations.
const DRY_RUN_BASE: u64 = 0x1000_0000;

/// Inspect structdt layout files
#[derive(Parser, Debug)]
#[command(name = "structdt-inspect")]
#[command(version)]
#[command(about = "Show derived layouts, packed bytes and registration entries")]
struct Args {
    /// Layout YAML file
    #[arg(value_name = "FILE")]
    layout: PathBuf,

    /// Only inspect this type (default: all)
    #[arg(short = 't', long = "type", value_name = "NAME")]
    type_name: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    format: Format,

    /// Pack LEN bytes starting at packed OFFSET from a patterned buffer
    #[arg(short, long, value_name = "OFFSET:LEN", value_parser = parse_window)]
    gather: Option<(usize, usize)>,

    /// Dry-run a registration against a loopback memory domain
    #[arg(short, long)]
    register: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

fn parse_window(s: &str) -> Result<(usize, usize), String> {
    let (offset, len) = s
        .split_once(':')
        .ok_or_else(|| format!("expected OFFSET:LEN, got '{}'", s))?;
    let offset = offset
        .trim()
        .parse()
        .map_err(|e| format!("bad offset '{}': {}", offset, e))?;
    let len = len
        .trim()
        .parse()
        .map_err(|e| format!("bad length '{}': {}", len, e))?;
    Ok((offset, len))
}

#[derive(Debug, Serialize)]
struct TypeReport {
    name: String,
    kind: DatatypeKind,
    length: Option<usize>,
    extent: Option<usize>,
    low_bound: Option<isize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    layout: Option<Layout>,
    #[serde(skip_serializing_if = "Option::is_none")]
    members: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rep_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gather: Option<GatherReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    registration: Option<Vec<RequestReport>>,
}

#[derive(Debug, Serialize)]
struct GatherReport {
    offset: usize,
    length: usize,
    bytes: String,
}

#[derive(Debug, Serialize)]
struct RequestReport {
    handle: Option<u64>,
    rep_count: usize,
    iovs: Vec<IovReport>,
}

#[derive(Debug, Serialize)]
struct IovReport {
    address: u64,
    length: usize,
    stride: usize,
    handle: u64,
}

impl From<RegRequest> for RequestReport {
    fn from(req: RegRequest) -> Self {
        Self {
            handle: req.handle.map(|h| h.raw()),
            rep_count: req.rep_count,
            iovs: req
                .iovs
                .into_iter()
                .map(|iov| IovReport {
                    address: iov.address,
                    length: iov.length,
                    stride: iov.stride,
                    handle: iov.handle.raw(),
                })
                .collect(),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let doc = LayoutLoader::parse_file(&args.layout)
        .with_context(|| format!("loading {}", args.layout.display()))?;
    let config = doc
        .engine
        .clone()
        .unwrap_or_default()
        .apply_overrides(|key| std::env::var(key).ok());
    let ctx = DatatypeContext::new(config);
    let set = LayoutLoader::build(&ctx, &doc)?;

    let selected: Vec<(&str, &Datatype)> = match &args.type_name {
        Some(name) => {
            let dt = set
                .get(name)
                .with_context(|| format!("no type named '{}' in {}", name, args.layout.display()))?;
            vec![(name.as_str(), dt)]
        }
        None => set.iter().collect(),
    };

    let mut reports = Vec::with_capacity(selected.len());
    for (name, dt) in selected {
        reports.push(inspect(&ctx, name, dt, &args)?);
    }

    match args.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        Format::Pretty => {
            for report in &reports {
                print!("{}", render(report));
            }
        }
    }

    log::debug!("[structdt-inspect] metrics: {:?}", ctx.metrics().snapshot());
    set.destroy(&ctx);
    Ok(())
}

fn inspect(ctx: &DatatypeContext, name: &str, dt: &Datatype, args: &Args) -> Result<TypeReport> {
    let s = dt.as_struct();
    let mut report = TypeReport {
        name: name.to_string(),
        kind: dt.kind(),
        length: dt.length(1),
        extent: dt.extent(),
        low_bound: dt.low_bound(),
        layout: s.map(|s| *s.layout()),
        members: s.map(|s| s.member_count()),
        rep_count: s.map(|s| s.rep_count()),
        gather: None,
        registration: None,
    };

    if let Some((offset, length)) = args.gather {
        report.gather = Some(gather(name, dt, offset, length)?);
    }

    if args.register {
        let Some(s) = s else {
            bail!("'{}' is not a structure; only structures register", name);
        };
        let md = Arc::new(LoopbackDomain::new("loopback", 0));
        let extent = s.layout().extent;
        let contig = md.register_contig(DRY_RUN_BASE, extent);
        let domain: Arc<dyn MemoryDomain> = md.clone();
        s.register_on_domain(&domain, DRY_RUN_BASE, contig)
            .with_context(|| format!("dry-run registration of '{}'", name))?;
        report.registration = Some(md.requests().into_iter().map(RequestReport::from).collect());
        log::debug!(
            "[structdt-inspect] '{}' registered: {} cached, ctx registrations {}",
            name,
            s.cache().len(),
            ctx.metrics().snapshot().registrations
        );
    }

    Ok(report)
}

fn gather(name: &str, dt: &Datatype, offset: usize, length: usize) -> Result<GatherReport> {
    let (Some(total), Some(extent), Some(lb)) = (dt.length(1), dt.extent(), dt.low_bound()) else {
        bail!("'{}' has no fixed layout to pack", name);
    };
    match offset.checked_add(length) {
        Some(end) if end <= total => {}
        _ => bail!(
            "window {}:{} is outside the {} packed bytes of '{}'",
            offset,
            length,
            total,
            name
        ),
    }

    // The buffer starts at the low bound when it is negative, else at the base.
    let span = extent + lb.max(0).unsigned_abs();
    let src: Vec<u8> = (0..span).map(|i| i as u8).collect();
    let mut dest = vec![0u8; length];
    pack(dt, &mut dest, &src, offset, length)?;

    Ok(GatherReport {
        offset,
        length,
        bytes: hex_dump(&dest),
    })
}

fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let _ = write!(out, "{:08x} ", row * 16);
        for b in chunk {
            let _ = write!(out, " {:02x}", b);
        }
        out.push('\n');
    }
    out
}

fn render(r: &TypeReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({:?})", r.name, r.kind);
    if let Some(layout) = &r.layout {
        let _ = writeln!(
            out,
            "  len {} (step {} x {}), extent {}, lb {}, depth {}, iovs {}, members {}",
            layout.len,
            layout.step_len,
            r.rep_count.unwrap_or(1),
            layout.extent,
            layout.lb_displ,
            layout.depth,
            layout.iov_count,
            r.members.unwrap_or(0)
        );
    } else {
        let _ = writeln!(
            out,
            "  len {}, extent {}",
            opt(r.length),
            opt(r.extent)
        );
    }
    if let Some(g) = &r.gather {
        let _ = writeln!(out, "  gather {}:{}", g.offset, g.length);
        for line in g.bytes.lines() {
            let _ = writeln!(out, "    {}", line);
        }
    }
    if let Some(reqs) = &r.registration {
        for (i, req) in reqs.iter().enumerate() {
            let handle = req.handle.map_or_else(|| "-".to_string(), |h| format!("{:#x}", h));
            let _ = writeln!(out, "  reg #{} x{} -> memh {}", i, req.rep_count, handle);
            for iov in &req.iovs {
                let _ = writeln!(
                    out,
                    "    +{:<6} len {:<6} stride {:<6} memh {:#x}",
                    iov.address.wrapping_sub(DRY_RUN_BASE) as i64,
                    iov.length,
                    iov.stride,
                    iov.handle
                );
            }
        }
    }
    out
}

fn opt(v: Option<usize>) -> String {
    v.map_or_else(|| "-".to_string(), |v| v.to_string())
}
