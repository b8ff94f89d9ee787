//! Cancelable callback registry.
//!
//! The table is guarded by a single mutex. Handlers are taken out of the
//! table under the lock and invoked after it is released, so a handler may
//! call back into the registry.

use super::{CommandFailure, CommandOutcome, ContextHandle, ContextState, StatusFailure};
use crate::dispatch::ResponseFields;
use crate::error::{ClientError, Result};
use crate::status::StatusCode;
use crate::transport::TransportFailure;
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Instant;

type OutcomeHandler = Box<dyn FnOnce(CommandOutcome) + Send + 'static>;

struct PendingRequest {
    handler: OutcomeHandler,
    registered_at: Instant,
}

enum Slot {
    Reserved,
    Live(PendingRequest),
}

struct Table {
    /// Next handle to issue. Every raw value below it has been issued.
    next_id: u64,
    slots: HashMap<ContextHandle, Slot>,
}

/// Maps context handles to their pending callbacks.
///
/// Each live context fires exactly one callback, at most once. Retired
/// handles never come back.
pub struct CallbackRegistry {
    table: Mutex<Table>,
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                next_id: 1,
                slots: HashMap::new(),
            }),
        }
    }

    /// Issue a fresh handle in the `Reserved` state.
    ///
    /// The slot stays in the table until the handle is registered and
    /// resolved, or canceled. Callers that give up on a handle before
    /// registering must `cancel` it.
    pub fn allocate(&self) -> ContextHandle {
        let mut table = self.table.lock();
        let handle = ContextHandle(table.next_id);
        table.next_id += 1;
        table.slots.insert(handle, Slot::Reserved);
        handle
    }

    /// Register split success/failure callbacks for `context`.
    pub fn register<S, F>(&self, context: ContextHandle, on_success: S, on_failure: F) -> Result<()>
    where
        S: FnOnce(ResponseFields) + Send + 'static,
        F: FnOnce(CommandFailure) + Send + 'static,
    {
        self.register_outcome(context, move |outcome| match outcome {
            CommandOutcome::Success(fields) => on_success(fields),
            CommandOutcome::Status(status) => on_failure(CommandFailure::Status(status)),
            CommandOutcome::Transport(failure) => on_failure(CommandFailure::Transport(failure)),
        })
    }

    /// Register a single handler receiving the full outcome.
    pub fn register_outcome<H>(&self, context: ContextHandle, handler: H) -> Result<()>
    where
        H: FnOnce(CommandOutcome) + Send + 'static,
    {
        let mut table = self.table.lock();
        let issued = context.0 != 0 && context.0 < table.next_id;
        match table.slots.get_mut(&context) {
            Some(slot @ Slot::Reserved) => {
                *slot = Slot::Live(PendingRequest {
                    handler: Box::new(handler),
                    registered_at: Instant::now(),
                });
                debug!("Registered {}", context);
                Ok(())
            }
            Some(Slot::Live(_)) => Err(ClientError::DuplicateContext(context)),
            None if issued => Err(ClientError::RetiredContext(context)),
            None => Err(ClientError::UnknownContext(context)),
        }
    }

    /// Retire `context` and hand its decoded fields to the success callback.
    pub fn resolve_success(&self, context: ContextHandle, fields: ResponseFields) -> Result<()> {
        self.resolve(context, CommandOutcome::Success(fields))
    }

    /// Retire `context` and invoke its failure callback with `status`.
    pub fn resolve_failure(
        &self,
        context: ContextHandle,
        status: StatusCode,
        debug_text: Option<String>,
    ) -> Result<()> {
        self.resolve(
            context,
            CommandOutcome::Status(StatusFailure::new(status, debug_text)),
        )
    }

    /// Retire `context` with a transport-level failure.
    pub fn resolve_transport_failure(
        &self,
        context: ContextHandle,
        failure: TransportFailure,
    ) -> Result<()> {
        self.resolve(context, CommandOutcome::Transport(failure))
    }

    fn resolve(&self, context: ContextHandle, outcome: CommandOutcome) -> Result<()> {
        let pending = self.take_live(context).inspect_err(|_| {
            warn!(
                "Response for {} which is not live (stale duplicate or canceled request)",
                context
            );
        })?;
        debug!(
            "Resolving {} after {:?} (success: {})",
            context,
            pending.registered_at.elapsed(),
            outcome.is_success()
        );
        (pending.handler)(outcome);
        Ok(())
    }

    fn take_live(&self, context: ContextHandle) -> Result<PendingRequest> {
        let mut table = self.table.lock();
        let Entry::Occupied(entry) = table.slots.entry(context) else {
            return Err(ClientError::UnknownContext(context));
        };
        if !matches!(entry.get(), Slot::Live(_)) {
            return Err(ClientError::UnknownContext(context));
        }
        match entry.remove() {
            Slot::Live(pending) => Ok(pending),
            Slot::Reserved => Err(ClientError::UnknownContext(context)),
        }
    }

    /// Retire `context` without invoking anything.
    ///
    /// Returns `true` if this call retired it. Canceling a retired or unknown
    /// handle is a no-op.
    pub fn cancel(&self, context: ContextHandle) -> bool {
        // Dropped outside the lock: a handler's captures may wake other tasks.
        let removed = self.table.lock().slots.remove(&context);
        match removed {
            Some(Slot::Live(_)) => {
                debug!("Canceled {}", context);
                true
            }
            Some(Slot::Reserved) => true,
            None => false,
        }
    }

    /// Retire every live context, delivering `failure` to each. Returns how many fired.
    pub fn fail_all(&self, failure: TransportFailure) -> usize {
        let pending = self.drain();
        let count = pending.len();
        for (context, request) in pending {
            debug!("Failing {}: {}", context, failure);
            (request.handler)(CommandOutcome::Transport(failure.clone()));
        }
        count
    }

    /// Retire every live context silently. Returns how many were live.
    pub fn cancel_all(&self) -> usize {
        self.drain().len()
    }

    fn drain(&self) -> Vec<(ContextHandle, PendingRequest)> {
        let mut table = self.table.lock();
        let mut pending: Vec<_> = table
            .slots
            .drain()
            .filter_map(|(context, slot)| match slot {
                Slot::Live(request) => Some((context, request)),
                Slot::Reserved => None,
            })
            .collect();
        pending.sort_by_key(|(context, _)| *context);
        pending
    }

    pub fn state(&self, context: ContextHandle) -> ContextState {
        let table = self.table.lock();
        match table.slots.get(&context) {
            Some(Slot::Reserved) => ContextState::Reserved,
            Some(Slot::Live(_)) => ContextState::Live,
            None if context.0 != 0 && context.0 < table.next_id => ContextState::Retired,
            None => ContextState::Unregistered,
        }
    }

    pub fn is_live(&self, context: ContextHandle) -> bool {
        self.state(context) == ContextState::Live
    }

    pub fn live_count(&self) -> usize {
        self.table
            .lock()
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Live(_)))
            .count()
    }
}
