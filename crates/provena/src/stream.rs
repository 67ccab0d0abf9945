//! Boundary stream adapters over `std::io` streams.
//!
//! The engine sees streams as a context token plus a table of four operation
//! pointers. This module provides one operation core shared by all stream
//! directions and three static tables, one per direction; operations a
//! direction does not support fail with an argument error rather than being
//! absent.
//!
//! Operation semantics at the boundary:
//! - read: negative size is an argument error, size zero reads nothing,
//!   end-of-stream is a short or zero count rather than an error
//! - write: success always reports the full requested size
//! - seek: returns the new absolute position; a negative offset from the
//!   start is an argument error
//! - `ErrorKind::Interrupted` is retried, `ErrorKind::InvalidInput` maps to
//!   the argument category, everything else to the i/o category

use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use provena_engine::{
    fault, BoundaryStream, FaultCode, SeekMode, StreamOps, StreamToken,
};

/// Wrap a readable stream for one boundary call.
pub(crate) fn input<S: Read + Seek>(stream: &mut S) -> BoundaryStream<'_> {
    BoundaryStream::new(StreamToken::Input(stream), &INPUT_OPS)
}

/// Wrap a writable stream for one boundary call.
pub(crate) fn output<S: Write + Seek>(stream: &mut S) -> BoundaryStream<'_> {
    BoundaryStream::new(StreamToken::Output(stream), &OUTPUT_OPS)
}

/// Wrap a read-write stream for one boundary call.
pub(crate) fn duplex<S: Read + Write + Seek>(stream: &mut S) -> BoundaryStream<'_> {
    BoundaryStream::new(StreamToken::Duplex(stream), &DUPLEX_OPS)
}

static INPUT_OPS: StreamOps = StreamOps {
    read: input_read,
    write: deny_write,
    seek: any_seek,
    flush: deny_flush,
};

static OUTPUT_OPS: StreamOps = StreamOps {
    read: deny_read,
    write: output_write,
    seek: any_seek,
    flush: output_flush,
};

static DUPLEX_OPS: StreamOps = StreamOps {
    read: duplex_read,
    write: duplex_write,
    seek: any_seek,
    flush: duplex_flush,
};

fn map_io(err: &std::io::Error) -> i64 {
    let code = if err.kind() == ErrorKind::InvalidInput {
        FaultCode::InvalidArgument
    } else {
        FaultCode::Io
    };
    fault(code, err.to_string())
}

fn read_core<R: Read + ?Sized>(stream: &mut R, buffer: &mut [u8], max_size: i64) -> i64 {
    if max_size < 0 {
        return fault(FaultCode::InvalidArgument, "negative read size");
    }
    if max_size == 0 {
        return 0;
    }
    let limit = usize::try_from(max_size).unwrap_or(usize::MAX).min(buffer.len());
    loop {
        match stream.read(&mut buffer[..limit]) {
            Ok(n) => return n as i64,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return map_io(&e),
        }
    }
}

fn write_core<W: Write + ?Sized>(stream: &mut W, buffer: &[u8]) -> i64 {
    match stream.write_all(buffer) {
        Ok(()) => buffer.len() as i64,
        Err(e) => map_io(&e),
    }
}

fn seek_core<S: Seek + ?Sized>(stream: &mut S, offset: i64, mode: SeekMode) -> i64 {
    let pos = match mode {
        SeekMode::Start => {
            if offset < 0 {
                return fault(FaultCode::InvalidArgument, "negative seek offset from start");
            }
            SeekFrom::Start(offset as u64)
        }
        SeekMode::Current => SeekFrom::Current(offset),
        SeekMode::End => SeekFrom::End(offset),
    };
    match stream.seek(pos) {
        Ok(p) => p as i64,
        Err(e) => map_io(&e),
    }
}

fn flush_core<W: Write + ?Sized>(stream: &mut W) -> i64 {
    match stream.flush() {
        Ok(()) => 0,
        Err(e) => map_io(&e),
    }
}

fn input_read(token: &mut StreamToken<'_>, buffer: &mut [u8], max_size: i64) -> i64 {
    match token {
        StreamToken::Input(s) => read_core(&mut **s, buffer, max_size),
        _ => deny_read(token, buffer, max_size),
    }
}

fn duplex_read(token: &mut StreamToken<'_>, buffer: &mut [u8], max_size: i64) -> i64 {
    match token {
        StreamToken::Duplex(s) => read_core(&mut **s, buffer, max_size),
        _ => deny_read(token, buffer, max_size),
    }
}

fn output_write(token: &mut StreamToken<'_>, buffer: &[u8]) -> i64 {
    match token {
        StreamToken::Output(s) => write_core(&mut **s, buffer),
        _ => deny_write(token, buffer),
    }
}

fn duplex_write(token: &mut StreamToken<'_>, buffer: &[u8]) -> i64 {
    match token {
        StreamToken::Duplex(s) => write_core(&mut **s, buffer),
        _ => deny_write(token, buffer),
    }
}

fn any_seek(token: &mut StreamToken<'_>, offset: i64, mode: SeekMode) -> i64 {
    match token {
        StreamToken::Input(s) => seek_core(&mut **s, offset, mode),
        StreamToken::Output(s) => seek_core(&mut **s, offset, mode),
        StreamToken::Duplex(s) => seek_core(&mut **s, offset, mode),
    }
}

fn output_flush(token: &mut StreamToken<'_>) -> i64 {
    match token {
        StreamToken::Output(s) => flush_core(&mut **s),
        _ => deny_flush(token),
    }
}

fn duplex_flush(token: &mut StreamToken<'_>) -> i64 {
    match token {
        StreamToken::Duplex(s) => flush_core(&mut **s),
        _ => deny_flush(token),
    }
}

fn deny_read(_: &mut StreamToken<'_>, _: &mut [u8], _: i64) -> i64 {
    fault(FaultCode::InvalidArgument, "stream does not support reads")
}

fn deny_write(_: &mut StreamToken<'_>, _: &[u8]) -> i64 {
    fault(FaultCode::InvalidArgument, "stream does not support writes")
}

fn deny_flush(token: &mut StreamToken<'_>) -> i64 {
    let _ = token;
    fault(FaultCode::InvalidArgument, "stream does not support flushing")
}
