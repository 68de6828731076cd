//! Single-flight claims per file id.
//!
//! The claim map is the only shared mutable state between workers. A file
//! id can be claimed by exactly one run at a time; releasing is automatic
//! when the guard drops, including on panic unwind.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct ClaimMap {
    active: Arc<Mutex<HashSet<String>>>,
}

impl ClaimMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the file id, or returns `None` when another run holds it.
    pub fn try_claim(&self, file_id: &str) -> Option<ClaimGuard> {
        let mut active = self.active.lock().ok()?;
        if !active.insert(file_id.to_string()) {
            return None;
        }
        Some(ClaimGuard {
            active: Arc::clone(&self.active),
            file_id: file_id.to_string(),
        })
    }
}

/// RAII release of a claim.
pub struct ClaimGuard {
    active: Arc<Mutex<HashSet<String>>>,
    file_id: String,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.file_id);
        }
    }
}
