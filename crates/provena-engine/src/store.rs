//! Manifest store model, asset container codec, and boundary-stream I/O
//! helpers shared by the builder and reader sides of the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::abi::{BoundaryStream, SeekMode};
use crate::fault::{EngineResult, Fault};

/// Reserved format literal for the unformatted, engine-agnostic container
/// used as the intermediate representation of the data-hashed flow.
pub const UNFORMATTED_FORMAT: &str = "application/x-provena-manifest";

/// extension -> MIME pairs the engine can bind manifests to.
const FORMAT_TABLE: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("mp4", "video/mp4"),
    ("pdf", "application/pdf"),
];

/// Normalize a format identifier (MIME type or bare file extension) to the
/// canonical MIME form, or fail with an argument error.
pub(crate) fn normalize_format(format: &str) -> EngineResult<&'static str> {
    let wanted = format.trim().to_ascii_lowercase();
    if wanted == UNFORMATTED_FORMAT {
        return Ok(UNFORMATTED_FORMAT);
    }
    for (ext, mime) in FORMAT_TABLE {
        if wanted == *ext || wanted == *mime {
            return Ok(mime);
        }
    }
    Err(Fault::invalid(format!("unsupported format: {format}")))
}

/// Distinct MIME types the engine supports, including the unformatted
/// container literal.
pub(crate) fn supported_mime_types() -> Vec<String> {
    let mut mimes: Vec<String> = Vec::new();
    for (_, mime) in FORMAT_TABLE {
        if !mimes.iter().any(|m| m == mime) {
            mimes.push((*mime).to_string());
        }
    }
    mimes.push(UNFORMATTED_FORMAT.to_string());
    mimes
}

/// Signature block inside a manifest store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SignatureBlock {
    pub alg: String,
    pub certificates: String,
    pub payload_digest: String,
    /// Base64-encoded raw signature bytes.
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_authority: Option<String>,
}

/// Byte range excluded from a data hash (the space reserved for the
/// manifest itself).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Exclusion {
    pub start: u64,
    pub length: u64,
}

/// Caller-supplied hash description for the data-hashed signing flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DataHashDef {
    #[serde(default)]
    pub exclusions: Vec<Exclusion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `sha256:<hex>` digest over the asset minus the exclusions. When
    /// absent, the engine computes it from the asset stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// The manifest store: everything embedded into (or referenced from) a
/// signed asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ManifestStore {
    pub instance_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_generator: Option<String>,
    pub manifest: Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_hash: Option<DataHashDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureBlock>,
}

impl ManifestStore {
    /// Canonical payload bytes: the store serialized without its signature
    /// block. This is what gets digested and signed.
    pub(crate) fn payload_bytes(&self) -> EngineResult<Vec<u8>> {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        serde_json::to_vec(&unsigned)
            .map_err(|e| Fault::engine(format!("failed to serialize manifest store: {e}")))
    }

    pub(crate) fn payload_digest(&self) -> EngineResult<String> {
        Ok(sha256_hex(&self.payload_bytes()?))
    }

    pub(crate) fn to_bytes(&self) -> EngineResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Fault::engine(format!("failed to serialize manifest store: {e}")))
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> EngineResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Fault::engine(format!("malformed manifest store: {e}")))
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

// ---------------------------------------------------------------------------
// Asset container codec
//
// A signed asset is the original byte stream followed by a fixed-layout
// trailer: [payload][payload_len: u64 le][kind: u8][magic: 8 bytes].
// Readers detect the trailer from the end of the stream, so the original
// asset bytes are never reinterpreted.
// ---------------------------------------------------------------------------

const TRAILER_MAGIC: [u8; 8] = *b"PVNAMAN1";
const TRAILER_FIXED_LEN: u64 = 17;

/// What the trailer payload holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrailerKind {
    /// The manifest store itself.
    EmbeddedStore,
    /// A URL where the store is hosted.
    RemoteRef,
}

impl TrailerKind {
    fn tag(self) -> u8 {
        match self {
            TrailerKind::EmbeddedStore => 0,
            TrailerKind::RemoteRef => 1,
        }
    }

    fn from_tag(tag: u8) -> EngineResult<Self> {
        match tag {
            0 => Ok(TrailerKind::EmbeddedStore),
            1 => Ok(TrailerKind::RemoteRef),
            other => Err(Fault::engine(format!(
                "unknown manifest trailer kind: {other}"
            ))),
        }
    }
}

/// Encode a trailer for appending after the asset bytes.
pub(crate) fn encode_trailer(kind: TrailerKind, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + TRAILER_FIXED_LEN as usize);
    out.extend_from_slice(payload);
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.push(kind.tag());
    out.extend_from_slice(&TRAILER_MAGIC);
    out
}

/// Locate and decode the trailer of a stream, if present.
///
/// Returns `Ok(None)` for streams that simply carry no manifest; corrupt
/// trailers are engine errors.
pub(crate) fn decode_trailer(
    stream: &mut BoundaryStream<'_>,
) -> EngineResult<Option<(TrailerKind, Vec<u8>)>> {
    let total = seek(stream, 0, SeekMode::End)?;
    if total < TRAILER_FIXED_LEN {
        return Ok(None);
    }

    seek(stream, -(TRAILER_FIXED_LEN as i64), SeekMode::End)?;
    let mut fixed = [0u8; TRAILER_FIXED_LEN as usize];
    read_exact(stream, &mut fixed)?;
    if fixed[9..] != TRAILER_MAGIC {
        return Ok(None);
    }

    let payload_len = u64::from_le_bytes(fixed[..8].try_into().expect("8-byte slice"));
    let kind = TrailerKind::from_tag(fixed[8])?;
    if payload_len > total - TRAILER_FIXED_LEN {
        return Err(Fault::engine(format!(
            "corrupt manifest trailer: payload length {payload_len} exceeds stream"
        )));
    }

    let payload_start = total - TRAILER_FIXED_LEN - payload_len;
    seek(stream, payload_start as i64, SeekMode::Start)?;
    let mut payload = vec![0u8; payload_len as usize];
    read_exact(stream, &mut payload)?;
    Ok(Some((kind, payload)))
}

// ---------------------------------------------------------------------------
// Boundary-stream I/O helpers
//
// The engine only ever touches streams through the four boundary operations.
// A sentinel from any of them means the shim already recorded the precise
// category, so these helpers propagate `Fault::Recorded`.
// ---------------------------------------------------------------------------

const READ_CHUNK: usize = 64 * 1024;

pub(crate) fn seek(stream: &mut BoundaryStream<'_>, offset: i64, mode: SeekMode) -> EngineResult<u64> {
    let pos = stream.seek(offset, mode);
    if pos < 0 {
        return Err(Fault::Recorded);
    }
    Ok(pos as u64)
}

pub(crate) fn read_exact(stream: &mut BoundaryStream<'_>, buf: &mut [u8]) -> EngineResult<()> {
    let mut filled = 0usize;
    while filled < buf.len() {
        let remaining = &mut buf[filled..];
        let max = remaining.len() as i64;
        let n = stream.read(remaining, max);
        if n < 0 {
            return Err(Fault::Recorded);
        }
        if n == 0 {
            return Err(Fault::engine("unexpected end of stream"));
        }
        filled += n as usize;
    }
    Ok(())
}

/// Read the entire stream from its start.
pub(crate) fn read_all(stream: &mut BoundaryStream<'_>) -> EngineResult<Vec<u8>> {
    seek(stream, 0, SeekMode::Start)?;
    let mut out = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = stream.read(&mut chunk, READ_CHUNK as i64);
        if n < 0 {
            return Err(Fault::Recorded);
        }
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&chunk[..n as usize]);
    }
}

pub(crate) fn write_all(stream: &mut BoundaryStream<'_>, bytes: &[u8]) -> EngineResult<()> {
    let n = stream.write(bytes);
    if n < 0 {
        return Err(Fault::Recorded);
    }
    // The write contract reports the full requested size on success.
    debug_assert_eq!(n as usize, bytes.len());
    Ok(())
}

pub(crate) fn flush(stream: &mut BoundaryStream<'_>) -> EngineResult<()> {
    if stream.flush() < 0 {
        return Err(Fault::Recorded);
    }
    Ok(())
}

/// Digest an asset stream, skipping the excluded ranges.
pub(crate) fn hash_asset(
    stream: &mut BoundaryStream<'_>,
    exclusions: &[Exclusion],
) -> EngineResult<String> {
    let bytes = read_all(stream)?;
    let mut hasher = Sha256::new();
    let mut pos = 0u64;
    let mut sorted: Vec<&Exclusion> = exclusions.iter().collect();
    sorted.sort_by_key(|e| e.start);
    for excl in sorted {
        if excl.start < pos {
            return Err(Fault::invalid("data hash exclusions overlap"));
        }
        let start = (excl.start.min(bytes.len() as u64)) as usize;
        hasher.update(&bytes[pos as usize..start]);
        pos = excl
            .start
            .saturating_add(excl.length)
            .min(bytes.len() as u64);
    }
    hasher.update(&bytes[pos as usize..]);
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_normalization() {
        assert_eq!(normalize_format("jpg").unwrap(), "image/jpeg");
        assert_eq!(normalize_format("image/JPEG").unwrap(), "image/jpeg");
        assert_eq!(
            normalize_format(UNFORMATTED_FORMAT).unwrap(),
            UNFORMATTED_FORMAT
        );
        assert!(normalize_format("image/bmp").is_err());
    }

    #[test]
    fn trailer_layout_is_fixed() {
        let trailer = encode_trailer(TrailerKind::EmbeddedStore, b"abc");
        assert_eq!(trailer.len(), 3 + 17);
        assert_eq!(&trailer[..3], b"abc");
        assert_eq!(trailer[3..11], 3u64.to_le_bytes());
        assert_eq!(trailer[11], 0);
        assert_eq!(&trailer[12..], b"PVNAMAN1");
    }

    #[test]
    fn store_payload_excludes_signature() {
        let mut store = ManifestStore {
            instance_id: "urn:uuid:test".into(),
            claim_generator: None,
            manifest: serde_json::json!({"title": "t"}),
            resources: BTreeMap::new(),
            asset_hash: None,
            data_hash: None,
            signature: None,
        };
        let unsigned = store.payload_bytes().unwrap();
        store.signature = Some(SignatureBlock {
            alg: "ed25519".into(),
            certificates: "cert".into(),
            payload_digest: "sha256:00".into(),
            signature: "AA==".into(),
            timestamp_authority: None,
        });
        assert_eq!(store.payload_bytes().unwrap(), unsigned);
    }
}
