//! Reader handles: manifest extraction and inspection.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::abi::BoundaryStream;
use crate::fault::{to_count, to_handle, EngineResult, Fault};
use crate::settings::ContextHandle;
use crate::store::{
    decode_trailer, flush, normalize_format, supported_mime_types, write_all, ManifestStore,
    TrailerKind,
};

/// Opaque reader handle.
///
/// An empty reader (fresh from [`reader_from_context`]) holds no manifest;
/// [`reader_with_stream`] fills it from an asset. The asset bytes the engine
/// needs are copied in at that point, so the caller's stream is free as soon
/// as the call returns.
#[derive(Debug)]
pub struct ReaderHandle {
    store: Option<Loaded>,
}

#[derive(Debug)]
enum Loaded {
    Embedded {
        store: ManifestStore,
        raw_json: String,
    },
    Remote {
        url: String,
    },
}

/// Create an empty reader; the context is not referenced afterwards.
pub fn reader_from_context(_context: &ContextHandle) -> Option<ReaderHandle> {
    Some(ReaderHandle { store: None })
}

/// Load the manifest from an asset stream. Consumes the reader handle,
/// succeed or fail.
pub fn reader_with_stream(
    reader: ReaderHandle,
    format: &str,
    stream: &mut BoundaryStream<'_>,
) -> Option<ReaderHandle> {
    to_handle(with_stream(reader, format, stream))
}

fn with_stream(
    mut reader: ReaderHandle,
    format: &str,
    stream: &mut BoundaryStream<'_>,
) -> EngineResult<ReaderHandle> {
    normalize_format(format)?;
    let (kind, payload) = decode_trailer(stream)?
        .ok_or_else(|| Fault::engine("no manifest store found in asset"))?;
    reader.store = Some(match kind {
        TrailerKind::EmbeddedStore => {
            let store = ManifestStore::from_bytes(&payload)?;
            let raw_json = String::from_utf8(payload)
                .map_err(|_| Fault::engine("manifest store is not valid UTF-8"))?;
            Loaded::Embedded { store, raw_json }
        }
        TrailerKind::RemoteRef => {
            let url = String::from_utf8(payload)
                .map_err(|_| Fault::engine("remote manifest reference is not valid UTF-8"))?;
            Loaded::Remote { url }
        }
    });
    Ok(reader)
}

/// The manifest store as JSON.
///
/// Fails for a remote reference; the engine does not fetch over the network,
/// so the caller must resolve the URL itself and read the fetched bytes.
pub fn reader_json(reader: &ReaderHandle) -> Option<String> {
    to_handle(json(reader))
}

fn json(reader: &ReaderHandle) -> EngineResult<String> {
    match &reader.store {
        Some(Loaded::Embedded { raw_json, .. }) => Ok(raw_json.trim_end().to_string()),
        Some(Loaded::Remote { url }) => Err(Fault::engine(format!(
            "manifest store is hosted remotely at {url}; fetch it and read the result"
        ))),
        None => Err(Fault::engine("reader holds no manifest store")),
    }
}

/// Whether the asset carried the manifest store itself rather than a
/// remote reference.
pub fn reader_is_embedded(reader: &ReaderHandle) -> bool {
    matches!(reader.store, Some(Loaded::Embedded { .. }))
}

/// The remote manifest URL, when the asset carries a reference.
pub fn reader_remote_url(reader: &ReaderHandle) -> Option<String> {
    match &reader.store {
        Some(Loaded::Remote { url }) => Some(url.clone()),
        _ => None,
    }
}

/// Write the resource stored under `uri` to a stream.
pub fn reader_resource_to_stream(
    reader: &ReaderHandle,
    uri: &str,
    dest: &mut BoundaryStream<'_>,
) -> i64 {
    to_count(resource_to_stream(reader, uri, dest))
}

fn resource_to_stream(
    reader: &ReaderHandle,
    uri: &str,
    dest: &mut BoundaryStream<'_>,
) -> EngineResult<i64> {
    let store = match &reader.store {
        Some(Loaded::Embedded { store, .. }) => store,
        Some(Loaded::Remote { .. }) => {
            return Err(Fault::engine("resources are not available for a remote manifest"))
        }
        None => return Err(Fault::engine("reader holds no manifest store")),
    };
    let encoded = store
        .resources
        .get(uri)
        .ok_or_else(|| Fault::engine(format!("resource not found: {uri}")))?;
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| Fault::engine(format!("corrupt resource {uri}: {e}")))?;
    write_all(dest, &bytes)?;
    flush(dest)?;
    Ok(bytes.len() as i64)
}

/// MIME types the reader accepts.
pub fn reader_supported_mime_types() -> Vec<String> {
    supported_mime_types()
}
