//! Operation registry: at most one pending completion per operation kind.

use std::collections::BTreeMap;
use tokio::sync::oneshot;
use voxbridge_core::{ControllerError, OperationKind, Settlement};

pub type OperationResult = Result<Settlement, ControllerError>;

/// Caller-facing deferred result of one in-flight operation.
pub type Completion = oneshot::Sender<OperationResult>;

#[derive(Default)]
pub struct OperationRegistry {
    pending: BTreeMap<OperationKind, Completion>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `completion` for `kind`.
    ///
    /// Not guarded: a completion already pending for `kind` is displaced and
    /// handed back. Callers enforce exclusivity before calling this.
    pub fn begin(&mut self, kind: OperationKind, completion: Completion) -> Option<Completion> {
        self.pending.insert(kind, completion)
    }

    /// Resolves the completion pending for `kind`. Returns `false` when
    /// nothing was pending.
    pub fn settle(&mut self, kind: OperationKind, settlement: Settlement) -> bool {
        match self.pending.remove(&kind) {
            Some(completion) => {
                if completion.send(Ok(settlement)).is_err() {
                    tracing::debug!(kind = %kind, "caller dropped before settlement");
                }
                true
            }
            None => false,
        }
    }

    /// Fails only the completion pending for `kind`.
    pub fn fail(&mut self, kind: OperationKind, error: ControllerError) -> bool {
        match self.pending.remove(&kind) {
            Some(completion) => {
                let _ = completion.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Fails every pending completion with an error naming its own kind,
    /// then empties the registry. Returns how many were failed.
    pub fn fail_all(&mut self, message: &str) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for (kind, completion) in pending {
            tracing::debug!(kind = %kind, "failing pending operation");
            let _ = completion.send(Err(ControllerError::OperationFailed {
                kind,
                message: message.to_string(),
            }));
        }
        count
    }

    /// Drops every pending completion without settling it.
    pub fn discard_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.pending.contains_key(&kind)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_kinds(&self) -> Vec<OperationKind> {
        self.pending.keys().copied().collect()
    }
}
