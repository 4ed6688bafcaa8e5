//! Rollback record and the once-only finalizer guarding teardown

use crate::capture::CaptureSession;
use crate::network::mac::MacAddr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Original and replacement hardware address of the spoofed interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoofRecord {
    pub interface: String,
    pub original: MacAddr,
    pub replacement: MacAddr,
}

/// Everything teardown needs to undo a session
///
/// Written before the first mutation; captures are appended as they start.
pub struct SessionState {
    bridge: String,
    spoof: Option<SpoofRecord>,
    captures: Vec<CaptureSession>,
}

impl SessionState {
    pub fn new(bridge: impl Into<String>, spoof: Option<SpoofRecord>) -> Self {
        Self {
            bridge: bridge.into(),
            spoof,
            captures: Vec::new(),
        }
    }

    pub fn bridge(&self) -> &str {
        &self.bridge
    }

    pub fn spoof(&self) -> Option<&SpoofRecord> {
        self.spoof.as_ref()
    }

    pub fn captures(&self) -> &[CaptureSession] {
        &self.captures
    }

    pub fn push_capture(&mut self, session: CaptureSession) {
        self.captures.push(session);
    }

    /// Hand over every capture handle
    pub fn take_captures(&mut self) -> Vec<CaptureSession> {
        std::mem::take(&mut self.captures)
    }
}

/// Checked-and-set completion flag
#[derive(Debug, Default)]
pub struct Finalizer {
    fired: AtomicBool,
}

impl Finalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true exactly once; every later call returns false
    pub fn fire(&self) -> bool {
        self.fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    #[cfg(test)]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}
