//! Failure signaling for the boundary API.
//!
//! Engine functions never return structured errors. A failing call returns a
//! null handle or the negative sentinel, and the failure category plus a
//! human-readable message land in a process-wide "last error" slot. The slot
//! is overwritten by the next failing call and cleared when harvested, so
//! callers must harvest immediately after seeing a failure — see the
//! `boundary_call` critical section in the binding crate.

use std::sync::Mutex;

/// Failure sentinel for count-returning boundary operations.
///
/// Success is always a zero-or-positive count; the category of a failure is
/// never encoded in the return value, only in the last-error slot.
pub const SENTINEL: i64 = -1;

/// Failure categories, with fixed errno-flavored wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    /// Malformed or invalid input, including operations on a stream
    /// direction that does not support them.
    InvalidArgument,
    /// Underlying stream or device fault.
    Io,
    /// Producer output exceeds the consumer-declared capacity (signing only).
    NoBufferSpace,
    /// Failure originating inside the engine; message-only, no finer code.
    Engine,
}

impl FaultCode {
    /// Fixed wire code for this category.
    pub const fn code(self) -> i32 {
        match self {
            FaultCode::InvalidArgument => 22,
            FaultCode::Io => 5,
            FaultCode::NoBufferSpace => 105,
            FaultCode::Engine => 0,
        }
    }
}

/// Contents of the last-error slot.
#[derive(Debug, Clone)]
pub struct LastError {
    pub code: FaultCode,
    pub message: String,
}

static LAST_ERROR: Mutex<Option<LastError>> = Mutex::new(None);

/// Record a failure in the process-wide last-error slot.
///
/// Overwrites whatever was there. Stream and signer shims on the binding
/// side call this too; the slot is shared by everything behind the boundary.
pub fn set_last_error(code: FaultCode, message: impl Into<String>) {
    let message = message.into();
    tracing::debug!(code = code.code(), message = %message, "boundary fault");
    let mut slot = LAST_ERROR.lock().unwrap_or_else(|e| e.into_inner());
    *slot = Some(LastError { code, message });
}

/// Take and clear the most recent failure, if any.
pub fn take_last_error() -> Option<LastError> {
    let mut slot = LAST_ERROR.lock().unwrap_or_else(|e| e.into_inner());
    slot.take()
}

/// Record a failure and return the sentinel, for count-returning operations.
pub fn fault(code: FaultCode, message: impl Into<String>) -> i64 {
    set_last_error(code, message);
    SENTINEL
}

/// Internal failure value carried by engine code until it reaches the
/// boundary, where it is recorded into the slot.
#[derive(Debug)]
pub(crate) enum Fault {
    /// The slot was already set by a lower layer (a stream or signer shim);
    /// recording again would clobber the more precise category.
    Recorded,
    New { code: FaultCode, message: String },
}

impl Fault {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Fault::New {
            code: FaultCode::InvalidArgument,
            message: message.into(),
        }
    }

    pub(crate) fn engine(message: impl Into<String>) -> Self {
        Fault::New {
            code: FaultCode::Engine,
            message: message.into(),
        }
    }

    /// Record into the slot (no-op for `Recorded`).
    pub(crate) fn record(self) {
        if let Fault::New { code, message } = self {
            set_last_error(code, message);
        }
    }
}

pub(crate) type EngineResult<T> = Result<T, Fault>;

/// Adapt an internal result to the null-handle convention.
pub(crate) fn to_handle<T>(result: EngineResult<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(f) => {
            f.record();
            None
        }
    }
}

/// Adapt an internal count result to the sentinel convention.
pub(crate) fn to_count(result: EngineResult<i64>) -> i64 {
    match result {
        Ok(n) => n,
        Err(f) => {
            f.record();
            SENTINEL
        }
    }
}

/// Serializes tests that assert on the process-wide slot.
#[cfg(test)]
pub(crate) fn test_guard() -> std::sync::MutexGuard<'static, ()> {
    static GUARD: Mutex<()> = Mutex::new(());
    GUARD.lock().unwrap_or_else(|e| e.into_inner())
}
