//! Boundary transport contract between the engine and its bindings.
//!
//! The engine never sees a caller's native stream type. A binding hands it a
//! [`BoundaryStream`]: an opaque context token plus a table of four operation
//! pointers (read, write, seek, flush). Every operation returns a
//! zero-or-positive count on success or [`SENTINEL`](crate::fault::SENTINEL)
//! on failure, with the failure category reported through the ambient
//! last-error slot in [`fault`](crate::fault).
//!
//! Signing crosses the boundary the same way: an opaque [`SignerToken`] plus
//! a single [`SignFn`] shim that the engine invokes synchronously during a
//! sign operation.

use std::any::Any;
use std::fmt;
use std::io::{Read, Seek, Write};

/// Seek origin for the boundary seek operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    Start,
    Current,
    End,
}

/// Capability of an input-only stream.
pub trait InputStream: Read + Seek {}
impl<T: Read + Seek + ?Sized> InputStream for T {}

/// Capability of an output-only stream.
pub trait OutputStream: Write + Seek {}
impl<T: Write + Seek + ?Sized> OutputStream for T {}

/// Capability of a read-write stream with one unified cursor.
pub trait DuplexStream: Read + Write + Seek {}
impl<T: Read + Write + Seek + ?Sized> DuplexStream for T {}

/// Context token binding a native stream for the duration of one boundary
/// call. The engine treats it as opaque; only the operation table the binding
/// installed knows which capability is inside.
pub enum StreamToken<'a> {
    Input(&'a mut dyn InputStream),
    Output(&'a mut dyn OutputStream),
    Duplex(&'a mut dyn DuplexStream),
}

/// `read(token, buffer, max_size) -> bytes_read | SENTINEL`
///
/// A negative `max_size` is an argument error; `max_size == 0` returns 0
/// without touching the buffer; end-of-stream is a short (possibly zero)
/// count, not an error.
pub type ReadFn = fn(&mut StreamToken<'_>, &mut [u8], i64) -> i64;

/// `write(token, buffer) -> bytes_written | SENTINEL`
///
/// The buffer length carries the requested size; success always reports the
/// full length.
pub type WriteFn = fn(&mut StreamToken<'_>, &[u8]) -> i64;

/// `seek(token, offset, mode) -> new_absolute_position | SENTINEL`
pub type SeekFn = fn(&mut StreamToken<'_>, i64, SeekMode) -> i64;

/// `flush(token) -> 0 | SENTINEL`
pub type FlushFn = fn(&mut StreamToken<'_>) -> i64;

/// Table of the four operation pointers a binding installs for a stream.
pub struct StreamOps {
    pub read: ReadFn,
    pub write: WriteFn,
    pub seek: SeekFn,
    pub flush: FlushFn,
}

/// A native stream as the engine sees it: context token plus operation table.
///
/// Created just before the boundary call that needs it and dropped with it;
/// the borrow inside the token keeps it from outliving the caller's stream.
pub struct BoundaryStream<'a> {
    token: StreamToken<'a>,
    ops: &'static StreamOps,
}

impl<'a> BoundaryStream<'a> {
    pub fn new(token: StreamToken<'a>, ops: &'static StreamOps) -> Self {
        Self { token, ops }
    }

    pub fn read(&mut self, buffer: &mut [u8], max_size: i64) -> i64 {
        (self.ops.read)(&mut self.token, buffer, max_size)
    }

    pub fn write(&mut self, buffer: &[u8]) -> i64 {
        (self.ops.write)(&mut self.token, buffer)
    }

    pub fn seek(&mut self, offset: i64, mode: SeekMode) -> i64 {
        (self.ops.seek)(&mut self.token, offset, mode)
    }

    pub fn flush(&mut self) -> i64 {
        (self.ops.flush)(&mut self.token)
    }
}

/// `sign(token, data, out_signature, max_len) -> signature_len | SENTINEL`
///
/// The shim must never write more than `max_len` bytes into the output
/// buffer and must convert any failure of the wrapped callback into the
/// sentinel; nothing may propagate across the boundary.
pub type SignFn = fn(&SignerToken, &[u8], &mut [u8], usize) -> i64;

/// Opaque token carrying a binding-side signing capability.
///
/// The binding constructs it around whatever capability object its shim
/// expects and downcasts inside the shim; the engine only stores and
/// forwards it.
pub struct SignerToken(Box<dyn Any + Send + Sync>);

impl fmt::Debug for SignerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerToken").finish_non_exhaustive()
    }
}

impl SignerToken {
    pub fn new(capability: impl Any + Send + Sync) -> Self {
        Self(Box::new(capability))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}
