//! Cooperative Cancellation
//!
//! A cloneable flag polled by adapters and pipelines between steps.
//! There is no preemption: an in-flight provider call always runs to
//! completion, and the flag is observed at the next poll point.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::{ForgeError, Result};

/// Shared cancellation flag
///
/// Clones share the same flag, so one token can be handed to the pipeline,
/// the research client and a signal handler at once.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear the flag so a stopped run can be resumed with the same token
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Poll point: `Err(Cancelled)` once cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ForgeError::Cancelled)
        } else {
            Ok(())
        }
    }
}
