// src/session/cancel.rs — Single-slot cancellation handle
//
// At most one exchange is live. Installing a new token cancels and replaces
// any previous one, so two streams never run side by side.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Slot {
    generation: u64,
    active: Option<Active>,
}

struct Active {
    generation: u64,
    token: CancellationToken,
}

/// Cloneable view of a session's live cancellation token.
#[derive(Clone, Default)]
pub struct CancelHandle {
    slot: Arc<Mutex<Slot>>,
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

impl CancelHandle {
    /// Install a fresh token. The returned guard clears the slot when
    /// dropped, on every exit path.
    pub fn install(&self) -> ActiveGuard {
        let token = CancellationToken::new();
        let mut slot = self.lock();
        let generation = slot.generation + 1;
        slot.generation = generation;
        let previous = slot.active.replace(Active {
            generation,
            token: token.clone(),
        });
        drop(slot);

        if let Some(previous) = previous {
            tracing::warn!("replacing a live stream; cancelling the previous one");
            previous.token.cancel();
        }
        ActiveGuard {
            handle: self.clone(),
            generation,
            token,
        }
    }

    /// Signal the live token. Returns false when nothing is in flight.
    pub fn cancel(&self) -> bool {
        match &self.lock().active {
            Some(active) => {
                active.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock().active.is_some()
    }

    fn release(&self, generation: u64) {
        let mut slot = self.lock();
        if slot.active.as_ref().map(|a| a.generation) == Some(generation) {
            slot.active = None;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct ActiveGuard {
    handle: CancelHandle,
    generation: u64,
    token: CancellationToken,
}

impl ActiveGuard {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.handle.release(self.generation);
    }
}
