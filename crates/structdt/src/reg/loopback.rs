// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Software memory domain and endpoint.
//!
//! Issues sequential handles, tracks which are live and records every
//! non-contiguous request it receives. Nothing is pinned; it exists for tests
//! and for dry-run inspection of the entry lists a structure produces.

use super::transport::{
    Completion, Endpoint, Lane, LaneIndex, MdIndex, MemHandle, MemoryDomain, RegIov,
    TransportEndpoint, TransportStatus, MAX_MDS,
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Status code returned for injected and bookkeeping failures.
pub const LOOPBACK_ERR_STATUS: i32 = -3;

/// One recorded `mem_reg_nc` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegRequest {
    /// Handle issued, `None` if the request was failed.
    pub handle: Option<MemHandle>,
    pub iovs: Vec<RegIov>,
    pub rep_count: usize,
}

#[derive(Debug, Default)]
struct DomainState {
    live: BTreeSet<MemHandle>,
    requests: Vec<RegRequest>,
    deregistered: Vec<MemHandle>,
}

/// In-process memory domain.
#[derive(Debug)]
pub struct LoopbackDomain {
    name: String,
    index: MdIndex,
    next_handle: AtomicU64,
    nc_calls: AtomicUsize,
    /// 1-based index of the non-contiguous call to fail; 0 disables.
    fail_at: AtomicUsize,
    state: Mutex<DomainState>,
}

impl LoopbackDomain {
    /// # Panics
    ///
    /// If `index` does not fit an [`MdMap`](super::MdMap).
    #[must_use]
    pub fn new(name: impl Into<String>, index: MdIndex) -> Self {
        assert!(
            usize::from(index) < MAX_MDS,
            "memory domain index {index} out of range (max {MAX_MDS})"
        );
        Self {
            name: name.into(),
            index,
            next_handle: AtomicU64::new(1),
            nc_calls: AtomicUsize::new(0),
            fail_at: AtomicUsize::new(0),
            state: Mutex::new(DomainState::default()),
        }
    }

    /// Fail the `n`-th non-contiguous registration from now (1-based).
    pub fn fail_nth(&self, n: usize) {
        self.nc_calls.store(0, Ordering::Relaxed);
        self.fail_at.store(n, Ordering::Relaxed);
    }

    /// Register a plain contiguous region and return its handle.
    pub fn register_contig(&self, address: u64, length: usize) -> MemHandle {
        let handle = self.issue();
        self.state.lock().live.insert(handle);
        log::debug!(
            "[structdt::loopback] {}: contig {:#x}+{} -> memh {:#x}",
            self.name,
            address,
            length,
            handle.raw()
        );
        handle
    }

    /// Handles issued and not yet deregistered.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    #[must_use]
    pub fn live_handles(&self) -> Vec<MemHandle> {
        self.state.lock().live.iter().copied().collect()
    }

    /// Every non-contiguous request received, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<RegRequest> {
        self.state.lock().requests.clone()
    }

    /// Handles released through [`MemoryDomain::mem_dereg_nc`], in call order.
    #[must_use]
    pub fn deregistered(&self) -> Vec<MemHandle> {
        self.state.lock().deregistered.clone()
    }

    fn issue(&self) -> MemHandle {
        MemHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }
}

impl MemoryDomain for LoopbackDomain {
    fn name(&self) -> &str {
        &self.name
    }

    fn index(&self) -> MdIndex {
        self.index
    }

    fn mem_reg_nc(&self, iovs: &[RegIov], rep_count: usize) -> Result<MemHandle, TransportStatus> {
        let call = self.nc_calls.fetch_add(1, Ordering::Relaxed) + 1;
        let failed = call == self.fail_at.load(Ordering::Relaxed);

        let mut state = self.state.lock();
        let handle = if failed {
            None
        } else {
            let h = self.issue();
            state.live.insert(h);
            Some(h)
        };
        state.requests.push(RegRequest {
            handle,
            iovs: iovs.to_vec(),
            rep_count,
        });

        handle.ok_or_else(|| {
            TransportStatus::new(
                LOOPBACK_ERR_STATUS,
                format!("{}: injected failure on registration #{call}", self.name),
            )
        })
    }

    fn mem_dereg_nc(&self, handle: MemHandle) -> Result<(), TransportStatus> {
        let mut state = self.state.lock();
        if !state.live.remove(&handle) {
            return Err(TransportStatus::new(
                LOOPBACK_ERR_STATUS,
                format!("{}: memh {:#x} is not registered", self.name, handle.raw()),
            ));
        }
        state.deregistered.push(handle);
        Ok(())
    }
}

/// How the loopback endpoint signals the completion token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// Completed successfully before `mem_reg_nc` returns.
    #[default]
    Immediate,
    /// Never completed.
    Pending,
    /// Completed with this failure status.
    Fail(TransportStatus),
}

#[derive(Debug)]
struct LoopbackTransport {
    domain: Arc<LoopbackDomain>,
    mode: CompletionMode,
}

impl TransportEndpoint for LoopbackTransport {
    fn mem_reg_nc(
        &self,
        iovs: &[RegIov],
        rep_count: usize,
        completion: &Completion,
    ) -> Result<(Arc<dyn MemoryDomain>, MemHandle), TransportStatus> {
        let handle = MemoryDomain::mem_reg_nc(self.domain.as_ref(), iovs, rep_count)?;
        match &self.mode {
            CompletionMode::Immediate => completion.complete(Ok(())),
            CompletionMode::Pending => {}
            CompletionMode::Fail(status) => completion.complete(Err(status.clone())),
        }
        let domain: Arc<dyn MemoryDomain> = self.domain.clone();
        Ok((domain, handle))
    }
}

/// Single-lane endpoint bound to a [`LoopbackDomain`].
#[derive(Debug, Clone)]
pub struct LoopbackEndpoint {
    lane: Lane,
}

impl LoopbackEndpoint {
    #[must_use]
    pub fn new(domain: Arc<LoopbackDomain>) -> Self {
        Self::with_completion(domain, CompletionMode::Immediate)
    }

    #[must_use]
    pub fn with_completion(domain: Arc<LoopbackDomain>, mode: CompletionMode) -> Self {
        let md_index = domain.index();
        Self {
            lane: Lane {
                transport: Arc::new(LoopbackTransport { domain, mode }),
                md_index,
            },
        }
    }
}

impl Endpoint for LoopbackEndpoint {
    fn lane(&self, lane: LaneIndex) -> Option<Lane> {
        (lane == 0).then(|| self.lane.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iov(address: u64) -> RegIov {
        RegIov {
            address,
            length: 4,
            stride: 8,
            handle: MemHandle::new(0),
        }
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_domain_index_must_fit_map() {
        let _ = LoopbackDomain::new("lo", 64);
    }

    #[test]
    fn test_handles_are_sequential_and_tracked() {
        let md = LoopbackDomain::new("lo", 2);
        let a = md.register_contig(0x100, 16);
        let b = MemoryDomain::mem_reg_nc(&md, &[iov(0x100)], 3).unwrap();
        assert_eq!(b.raw(), a.raw() + 1);
        assert_eq!(md.live_count(), 2);

        let reqs = md.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].handle, Some(b));
        assert_eq!(reqs[0].rep_count, 3);
    }

    #[test]
    fn test_double_dereg_is_reported() {
        let md = LoopbackDomain::new("lo", 0);
        let h = md.register_contig(0, 8);
        assert!(md.mem_dereg_nc(h).is_ok());
        let err = md.mem_dereg_nc(h).unwrap_err();
        assert_eq!(err.code, LOOPBACK_ERR_STATUS);
        assert_eq!(md.deregistered(), vec![h]);
    }

    #[test]
    fn test_fail_nth() {
        let md = LoopbackDomain::new("lo", 0);
        md.fail_nth(2);
        assert!(MemoryDomain::mem_reg_nc(&md, &[iov(0)], 1).is_ok());
        let err = MemoryDomain::mem_reg_nc(&md, &[iov(0)], 1).unwrap_err();
        assert!(err.message.contains("#2"));
        assert!(MemoryDomain::mem_reg_nc(&md, &[iov(0)], 1).is_ok());
        assert_eq!(md.live_count(), 2);
        assert_eq!(md.requests()[1].handle, None);
    }

    #[test]
    fn test_endpoint_lanes() {
        let md = Arc::new(LoopbackDomain::new("lo", 5));
        let ep = LoopbackEndpoint::new(md.clone());
        assert!(ep.lane(1).is_none());
        let lane = ep.lane(0).unwrap();
        assert_eq!(lane.md_index, 5);

        let comp = Completion::new(1);
        let (owner, h) = lane.transport.mem_reg_nc(&[iov(0x40)], 2, &comp).unwrap();
        assert!(comp.is_done());
        assert_eq!(owner.index(), 5);
        assert_eq!(md.live_handles(), vec![h]);
    }
}
