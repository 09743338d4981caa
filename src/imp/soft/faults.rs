// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Fault codes, fault injection and call accounting for the software engine.

use crate::error::{NativeFault, Severity};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// ImageMagick-style exception codes used by the software engine.
pub mod codes {
    pub const RESOURCE_LIMIT: u32 = 400;
    pub const OPTION: u32 = 410;
    pub const MISSING_DELEGATE: u32 = 420;
    pub const CORRUPT_IMAGE: u32 = 425;
    pub const FILE_OPEN: u32 = 430;
    pub const BLOB: u32 = 435;
    pub const IMAGE: u32 = 445;
    pub const DRAW: u32 = 460;
}

pub(crate) fn option(reason: impl Into<String>) -> NativeFault {
    NativeFault::coded(codes::OPTION, reason)
}

pub(crate) fn missing_delegate(reason: impl Into<String>) -> NativeFault {
    NativeFault::coded(codes::MISSING_DELEGATE, reason)
}

pub(crate) fn too_large(columns: u64, rows: u64) -> NativeFault {
    NativeFault::coded(codes::RESOURCE_LIMIT, "width or height exceeds limit")
        .with_description(format!("{columns}x{rows}"))
}

pub(crate) fn corrupt(reason: impl Into<String>) -> NativeFault {
    NativeFault::coded(codes::CORRUPT_IMAGE, reason)
}

/// When an injected fault fires.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultPlan {
    /// Calls that succeed before the first failure.
    succeed_first: u32,
    /// Failures left; `None` fails forever.
    failures: Option<u32>,
    fault: NativeFault,
}

impl FaultPlan {
    /// Fails every call.
    pub fn always(severity: Severity, code: u32, reason: impl Into<String>) -> Self {
        FaultPlan {
            succeed_first: 0,
            failures: None,
            fault: NativeFault::new(severity, code, reason),
        }
    }

    /// Fails the next call only.
    pub fn once(severity: Severity, code: u32, reason: impl Into<String>) -> Self {
        FaultPlan {
            failures: Some(1),
            ..FaultPlan::always(severity, code, reason)
        }
    }

    /// Lets `calls` calls succeed, then fails every call after.
    pub fn after(calls: u32, severity: Severity, code: u32, reason: impl Into<String>) -> Self {
        FaultPlan {
            succeed_first: calls,
            ..FaultPlan::always(severity, code, reason)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.fault = self.fault.with_description(description);
        self
    }

    /// Advances the plan by one call. Returns the fault if this call fails.
    pub(crate) fn fire(&mut self) -> Option<NativeFault> {
        if self.succeed_first > 0 {
            self.succeed_first -= 1;
            return None;
        }
        match &mut self.failures {
            None => Some(self.fault.clone()),
            Some(0) => None,
            Some(left) => {
                *left -= 1;
                Some(self.fault.clone())
            }
        }
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.succeed_first == 0 && self.failures == Some(0)
    }
}

/// Counts calls and frames.
///
/// Shared by an engine and every frame it creates, so frames dropped after the
/// engine is gone are still counted.
#[derive(Debug, Default)]
pub struct Counters {
    native_calls: AtomicUsize,
    open_scopes: AtomicUsize,
    frames_created: AtomicUsize,
    frames_destroyed: AtomicUsize,
    next_frame_id: AtomicU64,
}

impl Counters {
    /// Call scopes opened so far.
    pub fn native_calls(&self) -> usize {
        self.native_calls.load(Ordering::SeqCst)
    }

    /// Call scopes currently open.
    pub fn open_scopes(&self) -> usize {
        self.open_scopes.load(Ordering::SeqCst)
    }

    pub fn frames_created(&self) -> usize {
        self.frames_created.load(Ordering::SeqCst)
    }

    pub fn frames_destroyed(&self) -> usize {
        self.frames_destroyed.load(Ordering::SeqCst)
    }

    /// Frames created and not yet destroyed.
    pub fn live_frames(&self) -> usize {
        self.frames_created() - self.frames_destroyed()
    }

    pub(crate) fn scope_opened(&self) {
        self.native_calls.fetch_add(1, Ordering::SeqCst);
        self.open_scopes.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn scope_closed(&self) {
        self.open_scopes.fetch_sub(1, Ordering::SeqCst);
    }

    /// Registers a new frame and returns its id.
    pub(crate) fn frame_created(&self) -> u64 {
        self.frames_created.fetch_add(1, Ordering::SeqCst);
        self.next_frame_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn frame_destroyed(&self) {
        self.frames_destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plans_fire_on_schedule() {
        let mut once = FaultPlan::once(Severity::Error, 410, "x");
        assert!(once.fire().is_some());
        assert!(once.fire().is_none());
        assert!(once.exhausted());

        let mut after = FaultPlan::after(2, Severity::Fatal, 42, "boom");
        assert!(after.fire().is_none());
        assert!(after.fire().is_none());
        let fault = after.fire().unwrap();
        assert_eq!((fault.severity, fault.code, fault.reason.as_str()), (Severity::Fatal, 42, "boom"));
        assert!(after.fire().is_some());
        assert!(!after.exhausted());
    }

    #[test]
    fn frame_ids_are_unique() {
        let c = Counters::default();
        let a = c.frame_created();
        let b = c.frame_created();
        assert_ne!(a, b);
        c.frame_destroyed();
        assert_eq!(c.live_frames(), 1);
    }
}
