// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Routing engine calls and translating their faults.
//!
//! Every fallible engine call in this crate goes through [`native`]. It opens a
//! [`CallScope`] (the engine's per-call error record), makes the call, and turns
//! a returned [`NativeFault`] into [`Error::NativeOperationFailed`]. The scope
//! is closed when the guard drops, so it is released on success, on failure,
//! and if the call unwinds.

use crate::engine::Engine;
use crate::error::{Error, NativeFault, Result};

/// An open per-call error scope on an engine.
///
/// Opening calls [`Engine::begin_call`]; dropping calls [`Engine::end_call`].
#[must_use = "the scope closes as soon as it is dropped"]
#[derive(Debug)]
pub struct CallScope<'e, E: Engine> {
    engine: &'e E,
    operation: &'static str,
}

impl<'e, E: Engine> CallScope<'e, E> {
    pub fn open(engine: &'e E, operation: &'static str) -> Self {
        engine.begin_call(operation);
        CallScope { engine, operation }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl<E: Engine> Drop for CallScope<'_, E> {
    fn drop(&mut self) {
        self.engine.end_call(self.operation);
    }
}

/// Makes one engine call inside a [`CallScope`].
pub fn native<E: Engine, T>(
    engine: &E,
    operation: &'static str,
    call: impl FnOnce(&E) -> std::result::Result<T, NativeFault>,
) -> Result<T> {
    let _scope = CallScope::open(engine, operation);
    call(engine).map_err(|fault| translate(operation, fault))
}

/// Converts a fault reported during `operation`.
pub fn translate(operation: &'static str, fault: NativeFault) -> Error {
    logwise::warn_sync!(
        "{operation} failed: {fault}",
        operation = operation,
        fault = logwise::privacy::LogIt(&fault)
    );
    Error::native(operation, fault)
}

/// Reports that an engine result could not be turned into a caller value.
///
/// Whatever native resource the result held must already be dropped.
pub(crate) fn construction_failed(operation: &'static str, reason: impl Into<String>) -> Error {
    let reason = reason.into();
    logwise::error_sync!(
        "{operation}: construction failed: {reason}",
        operation = operation,
        reason = logwise::privacy::LogIt(&reason)
    );
    Error::ConstructionFailed(reason)
}
