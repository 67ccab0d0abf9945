//! Error type and the boundary critical section.
//!
//! The engine reports failures through a process-wide last-error slot, so a
//! failing call and the harvest of its category must happen atomically with
//! respect to other boundary calls. [`boundary_handle`] and
//! [`boundary_count`] wrap every engine call in this crate with that
//! critical section.

use std::sync::{Mutex, MutexGuard};

use provena_engine::{take_last_error, FaultCode};

/// Failures surfaced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or invalid input, including operations a stream direction
    /// does not support.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Underlying stream or file failure.
    #[error("i/o failure: {0}")]
    Io(String),

    /// A signature was larger than the space reserved for it.
    #[error("signature exceeds the reserved buffer capacity")]
    NoBufferSpace,

    /// Failure inside the engine.
    #[error("{message}")]
    Engine { message: String },

    /// The handle was consumed by an earlier fallible operation and can no
    /// longer be used.
    #[error("{what} was consumed by an earlier operation and is no longer usable")]
    InvalidHandle { what: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

static BOUNDARY: Mutex<()> = Mutex::new(());

pub(crate) fn lock_boundary() -> MutexGuard<'static, ()> {
    BOUNDARY.lock().unwrap_or_else(|e| e.into_inner())
}

/// Run a handle-returning engine call and harvest the last error on `None`.
///
/// Must never nest: one engine call per critical section.
pub(crate) fn boundary_handle<T>(call: impl FnOnce() -> Option<T>) -> Result<T> {
    let _boundary = lock_boundary();
    call().ok_or_else(harvest)
}

/// Run a count-returning engine call and harvest the last error on a
/// negative return.
pub(crate) fn boundary_count(call: impl FnOnce() -> i64) -> Result<i64> {
    let _boundary = lock_boundary();
    let count = call();
    if count < 0 {
        return Err(harvest());
    }
    Ok(count)
}

fn harvest() -> Error {
    match take_last_error() {
        Some(last) => match last.code {
            FaultCode::InvalidArgument => Error::InvalidArgument(last.message),
            FaultCode::Io => Error::Io(last.message),
            FaultCode::NoBufferSpace => Error::NoBufferSpace,
            FaultCode::Engine => Error::Engine {
                message: last.message,
            },
        },
        None => {
            tracing::warn!("engine signaled failure without recording a fault");
            Error::Engine {
                message: "unspecified engine failure".to_string(),
            }
        }
    }
}
