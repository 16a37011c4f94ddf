//! Pending-call bookkeeping.
//!
//! Each outstanding call owns a [`ResultSlot`] shared (via `Arc`) between the
//! pending table and the caller's [`CallHandle`]. The table lock is only held
//! to insert, look up or remove a slot; waiting happens on the slot's own
//! condition variable.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use msgbus_frame::{MsgId, Payload};

use crate::error::{Result, RpcError};

type Outcome = Result<Payload>;

/// Single-assignment result cell with a wakeup.
pub(crate) struct ResultSlot {
    outcome: Mutex<Option<Outcome>>,
    ready: Condvar,
}

impl ResultSlot {
    pub(crate) fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Store the outcome and wake all waiters. Only the first outcome sticks.
    pub(crate) fn fulfil(&self, outcome: Outcome) -> bool {
        let mut guard = self.lock();
        if guard.is_some() {
            return false;
        }
        *guard = Some(outcome);
        drop(guard);
        self.ready.notify_all();
        true
    }

    pub(crate) fn peek(&self) -> Option<Outcome> {
        self.lock().clone()
    }

    pub(crate) fn wait(&self) -> Outcome {
        let mut guard = self.lock();
        loop {
            if let Some(outcome) = guard.as_ref() {
                return outcome.clone();
            }
            guard = self
                .ready
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wait until resolved or `deadline` passes; `None` on expiry.
    pub(crate) fn wait_until(&self, deadline: Instant) -> Option<Outcome> {
        let mut guard = self.lock();
        loop {
            if let Some(outcome) = guard.as_ref() {
                return Some(outcome.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            guard = self
                .ready
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Outcome>> {
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Map from correlation id to the slot awaiting that id's response.
#[derive(Default)]
pub(crate) struct PendingTable {
    slots: Mutex<HashMap<MsgId, Arc<ResultSlot>>>,
}

impl PendingTable {
    /// Register `slot` under `id`; refuses ids that are still in use.
    pub(crate) fn insert(&self, id: MsgId, slot: &Arc<ResultSlot>) -> bool {
        let mut slots = self.lock();
        if slots.contains_key(&id) {
            return false;
        }
        slots.insert(id, Arc::clone(slot));
        true
    }

    pub(crate) fn remove(&self, id: MsgId) -> Option<Arc<ResultSlot>> {
        self.lock().remove(&id)
    }

    /// Remove `id` only while it still maps to `slot`.
    pub(crate) fn remove_if_same(&self, id: MsgId, slot: &Arc<ResultSlot>) -> bool {
        let mut slots = self.lock();
        match slots.get(&id) {
            Some(current) if Arc::ptr_eq(current, slot) => {
                slots.remove(&id);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn drain(&self) -> Vec<(MsgId, Arc<ResultSlot>)> {
        self.lock().drain().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<MsgId, Arc<ResultSlot>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a call issued with `acall`.
///
/// The handle can be moved to, and resolved from, any thread. Dropping it
/// before the call resolves abandons the call: its pending slot is removed
/// and a late response is ignored.
pub struct CallHandle {
    id: MsgId,
    slot: Arc<ResultSlot>,
    pending: Arc<PendingTable>,
}

impl CallHandle {
    pub(crate) fn new(id: MsgId, slot: Arc<ResultSlot>, pending: Arc<PendingTable>) -> Self {
        Self { id, slot, pending }
    }

    /// Correlation id of the request.
    pub fn id(&self) -> MsgId {
        self.id
    }

    pub fn is_ready(&self) -> bool {
        self.slot.peek().is_some()
    }

    /// Non-blocking check; `None` while the call is still in flight.
    pub fn poll(&self) -> Option<Result<Payload>> {
        self.slot.peek()
    }

    /// Block until a response arrives or the connection fails.
    pub fn wait(self) -> Result<Payload> {
        self.slot.wait()
    }

    /// Block until a response arrives, the connection fails, or `timeout`
    /// elapses. A timeout too large to represent as an instant waits forever.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Payload> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_deadline(deadline, timeout),
            None => self.wait(),
        }
    }

    /// Like [`wait_timeout`](Self::wait_timeout) against a deadline fixed
    /// before the request was sent; `timeout` is only used in the error.
    pub(crate) fn wait_deadline(self, deadline: Instant, timeout: Duration) -> Result<Payload> {
        if let Some(outcome) = self.slot.wait_until(deadline) {
            return outcome;
        }

        if self.pending.remove_if_same(self.id, &self.slot) {
            return Err(RpcError::DeadlineExceeded(timeout));
        }

        // Someone else already took the slot out of the table and is about
        // to resolve it.
        self.slot.wait()
    }
}

impl Drop for CallHandle {
    fn drop(&mut self) {
        if self.slot.peek().is_none() {
            self.pending.remove_if_same(self.id, &self.slot);
        }
    }
}

impl fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallHandle")
            .field("id", &self.id)
            .field("ready", &self.is_ready())
            .finish()
    }
}
