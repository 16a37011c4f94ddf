use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use msgbus_frame::{Message, MessagePtr, MsgId, Payload, UNSET_ID};
use tracing::{debug, trace};

use crate::config::InvokerConfig;
use crate::error::{Result, RpcError};
use crate::slot::{CallHandle, PendingTable, ResultSlot};

/// Outbound sink for request messages.
///
/// Typically encodes the message and writes it to the connection; any
/// failure should be reported as [`RpcError::Unavailable`].
pub type MsgWriter = Arc<dyn Fn(MessagePtr) -> Result<()> + Send + Sync>;

/// Issues calls and matches responses to them by correlation id.
///
/// `call` and `acall` may be used from any number of threads while a single
/// I/O thread feeds responses through [`handle_response_message`]. Responses
/// can arrive in any order.
///
/// [`handle_response_message`]: BusInvoker::handle_response_message
pub struct BusInvoker {
    config: InvokerConfig,
    next_id: AtomicU32,
    pending: Arc<PendingTable>,
    writer: RwLock<Option<MsgWriter>>,
}

impl BusInvoker {
    pub fn new(config: InvokerConfig) -> Self {
        Self::starting_at(config, 1)
    }

    fn starting_at(config: InvokerConfig, first_id: MsgId) -> Self {
        Self {
            config,
            next_id: AtomicU32::new(first_id),
            pending: Arc::new(PendingTable::default()),
            writer: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// Install the sink used to send requests.
    pub fn set_msg_writer(&self, writer: MsgWriter) {
        *self.writer.write().unwrap_or_else(PoisonError::into_inner) = Some(writer);
    }

    /// Remove the sink; later calls fail with `Unavailable`.
    pub fn clear_msg_writer(&self) {
        *self.writer.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Blocking call using the configured default deadline.
    pub fn call(&self, method: &str, input: Payload) -> Result<Payload> {
        self.call_with_timeout(method, input, self.config.call_timeout)
    }

    /// Blocking call with an explicit deadline.
    ///
    /// The deadline starts before the request is sent, so time spent
    /// blocked on a slow send counts against it.
    pub fn call_with_timeout(
        &self,
        method: &str,
        input: Payload,
        timeout: Duration,
    ) -> Result<Payload> {
        let deadline = Instant::now().checked_add(timeout);
        let handle = self.acall(method, input)?;
        match deadline {
            Some(deadline) => handle.wait_deadline(deadline, timeout),
            None => handle.wait(),
        }
    }

    /// Send a request and return immediately with a handle to its result.
    pub fn acall(&self, method: &str, input: Payload) -> Result<CallHandle> {
        validate_method(method)?;
        let writer = self.msg_writer()?;

        let slot = Arc::new(ResultSlot::new());
        let id = self.register(&slot);
        let handle = CallHandle::new(id, slot, Arc::clone(&self.pending));

        // On failure the handle is dropped here, which removes the slot.
        writer(Arc::new(Message::request(id, method, input)))?;
        debug!(invoker = %self.config.name, id, method, "call issued");
        Ok(handle)
    }

    /// Send a request that expects no response (id 0).
    pub fn notify(&self, method: &str, input: Payload) -> Result<()> {
        validate_method(method)?;
        let writer = self.msg_writer()?;
        writer(Arc::new(Message::request(UNSET_ID, method, input)))
    }

    /// Deliver an inbound response to whoever is waiting on its id.
    ///
    /// Responses for unknown ids (late after a timeout, duplicated, or never
    /// issued) are dropped.
    pub fn handle_response_message(&self, msg: MessagePtr) {
        let id = msg.id();
        let Some(slot) = self.pending.remove(id) else {
            trace!(invoker = %self.config.name, id, "dropping response for unknown id");
            return;
        };

        let payload = Arc::try_unwrap(msg)
            .map(Message::into_payload)
            .unwrap_or_else(|shared| shared.data().clone());
        slot.fulfil(Ok(payload));
    }

    /// Resolve every pending call with `Unavailable`. Returns how many were
    /// failed.
    pub fn fail_all(&self, reason: &str) -> usize {
        let drained = self.pending.drain();
        let count = drained.len();
        for (_, slot) in drained {
            slot.fulfil(Err(RpcError::Unavailable(reason.to_string())));
        }
        if count > 0 {
            debug!(invoker = %self.config.name, count, reason, "failed pending calls");
        }
        count
    }

    /// Number of calls still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn msg_writer(&self) -> Result<MsgWriter> {
        self.writer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| RpcError::Unavailable("no message writer attached".to_string()))
    }

    fn next_msg_id(&self) -> MsgId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn register(&self, slot: &Arc<ResultSlot>) -> MsgId {
        loop {
            let id = self.next_msg_id();
            // 0 is reserved; ids still pending after a wraparound are skipped.
            if id != UNSET_ID && self.pending.insert(id, slot) {
                return id;
            }
        }
    }
}

impl fmt::Debug for BusInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusInvoker")
            .field("name", &self.config.name)
            .field("pending", &self.pending.len())
            .finish()
    }
}

fn validate_method(method: &str) -> Result<()> {
    if method.is_empty() {
        return Err(RpcError::InvalidArgument(
            "method name must not be empty".to_string(),
        ));
    }
    Ok(())
}
