//! Builder handles: manifest assembly, the direct signing flow, the
//! data-hashed signing flow, and archive round-trips.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::abi::{BoundaryStream, SeekMode};
use crate::fault::{to_count, to_handle, EngineResult, Fault};
use crate::settings::ContextHandle;
use crate::signer::SignerHandle;
use crate::store::{
    decode_trailer, encode_trailer, flush, hash_asset, normalize_format, read_all, seek,
    sha256_hex, supported_mime_types, write_all, DataHashDef, ManifestStore, SignatureBlock,
    TrailerKind, UNFORMATTED_FORMAT,
};

/// Space reserved by a data-hashed placeholder, remembered so the signed
/// manifest can be padded to exactly the reserved length.
#[derive(Debug)]
struct Reservation {
    format: &'static str,
    store_len: usize,
}

/// Opaque builder handle.
#[derive(Debug)]
pub struct BuilderHandle {
    claim_generator: Option<String>,
    verify_after_sign: bool,
    definition: Value,
    actions: Vec<Value>,
    ingredients: Vec<Value>,
    resources: BTreeMap<String, String>,
    no_embed: bool,
    remote_url: Option<String>,
    placeholder: Option<Reservation>,
}

/// Create an empty builder, copying what it needs from the context now;
/// the context is not referenced afterwards.
pub fn builder_from_context(context: &ContextHandle) -> Option<BuilderHandle> {
    Some(BuilderHandle {
        claim_generator: context.claim_generator(),
        verify_after_sign: context.verify_after_sign(),
        definition: Value::Object(serde_json::Map::new()),
        actions: Vec::new(),
        ingredients: Vec::new(),
        resources: BTreeMap::new(),
        no_embed: false,
        remote_url: None,
        placeholder: None,
    })
}

/// Set or replace the manifest definition. Consumes the builder handle,
/// succeed or fail.
pub fn builder_with_definition(builder: BuilderHandle, manifest_json: &str) -> Option<BuilderHandle> {
    to_handle(with_definition(builder, manifest_json))
}

fn with_definition(mut builder: BuilderHandle, manifest_json: &str) -> EngineResult<BuilderHandle> {
    let definition: Value = serde_json::from_str(manifest_json)
        .map_err(|e| Fault::invalid(format!("invalid manifest definition JSON: {e}")))?;
    if !definition.is_object() {
        return Err(Fault::invalid("manifest definition must be a JSON object"));
    }
    builder.definition = definition;
    Ok(builder)
}

/// Prevent embedding; the signed asset is written unchanged and the caller
/// hosts the manifest externally.
pub fn builder_set_no_embed(builder: &mut BuilderHandle) {
    builder.no_embed = true;
}

/// Record the URL where the manifest will be hosted; signing writes a
/// remote-reference trailer instead of the store.
pub fn builder_set_remote_url(builder: &mut BuilderHandle, url: &str) -> i64 {
    to_count(set_remote_url(builder, url).map(|()| 0))
}

fn set_remote_url(builder: &mut BuilderHandle, url: &str) -> EngineResult<()> {
    if !url.contains("://") {
        return Err(Fault::invalid(format!("invalid remote URL: {url}")));
    }
    builder.remote_url = Some(url.to_string());
    Ok(())
}

/// Attach a resource (e.g. a thumbnail) read from a stream.
pub fn builder_add_resource(
    builder: &mut BuilderHandle,
    uri: &str,
    source: &mut BoundaryStream<'_>,
) -> i64 {
    to_count(add_resource(builder, uri, source).map(|()| 0))
}

fn add_resource(
    builder: &mut BuilderHandle,
    uri: &str,
    source: &mut BoundaryStream<'_>,
) -> EngineResult<()> {
    if uri.is_empty() {
        return Err(Fault::invalid("resource URI must not be empty"));
    }
    let bytes = read_all(source)?;
    builder.resources.insert(uri.to_string(), BASE64.encode(bytes));
    Ok(())
}

/// Attach an ingredient described by JSON metadata plus its asset stream.
pub fn builder_add_ingredient(
    builder: &mut BuilderHandle,
    ingredient_json: &str,
    format: &str,
    source: &mut BoundaryStream<'_>,
) -> i64 {
    to_count(add_ingredient(builder, ingredient_json, format, source).map(|()| 0))
}

fn add_ingredient(
    builder: &mut BuilderHandle,
    ingredient_json: &str,
    format: &str,
    source: &mut BoundaryStream<'_>,
) -> EngineResult<()> {
    let mut ingredient: Value = serde_json::from_str(ingredient_json)
        .map_err(|e| Fault::invalid(format!("invalid ingredient JSON: {e}")))?;
    let map = ingredient
        .as_object_mut()
        .ok_or_else(|| Fault::invalid("ingredient must be a JSON object"))?;
    let mime = normalize_format(format)?;
    let bytes = read_all(source)?;
    map.insert("format".to_string(), Value::String(mime.to_string()));
    map.insert("hash".to_string(), Value::String(sha256_hex(&bytes)));
    builder.ingredients.push(ingredient);
    Ok(())
}

/// Record an action (e.g. `{"action": "c2pa.edited"}`) in the manifest.
pub fn builder_add_action(builder: &mut BuilderHandle, action_json: &str) -> i64 {
    to_count(add_action(builder, action_json).map(|()| 0))
}

fn add_action(builder: &mut BuilderHandle, action_json: &str) -> EngineResult<()> {
    let action: Value = serde_json::from_str(action_json)
        .map_err(|e| Fault::invalid(format!("invalid action JSON: {e}")))?;
    if action.get("action").and_then(Value::as_str).is_none() {
        return Err(Fault::invalid(
            "action definition requires an \"action\" string field",
        ));
    }
    builder.actions.push(action);
    Ok(())
}

impl BuilderHandle {
    /// Compose the manifest store for this builder's current state.
    fn compose_store(&self) -> EngineResult<ManifestStore> {
        let mut manifest = self.definition.clone();
        let map = manifest
            .as_object_mut()
            .ok_or_else(|| Fault::engine("manifest definition must be a JSON object"))?;
        if !self.actions.is_empty() {
            let entry = map
                .entry("actions".to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            let list = entry
                .as_array_mut()
                .ok_or_else(|| Fault::engine("manifest \"actions\" field is not an array"))?;
            list.extend(self.actions.iter().cloned());
        }
        if !self.ingredients.is_empty() {
            let entry = map
                .entry("ingredients".to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            let list = entry
                .as_array_mut()
                .ok_or_else(|| Fault::engine("manifest \"ingredients\" field is not an array"))?;
            list.extend(self.ingredients.iter().cloned());
        }
        Ok(ManifestStore {
            instance_id: format!("urn:uuid:{}", Uuid::new_v4()),
            claim_generator: self.claim_generator.clone(),
            manifest,
            resources: self.resources.clone(),
            asset_hash: None,
            data_hash: None,
            signature: None,
        })
    }
}

/// Digest the store payload and fill in the signature block.
fn sign_store(store: &mut ManifestStore, signer: &SignerHandle) -> EngineResult<()> {
    let digest = store.payload_digest()?;
    let signature = signer.sign_payload(digest.as_bytes())?;
    if signature.len() > signer.reserve() {
        return Err(Fault::engine("signature exceeds the signer's reserved size"));
    }
    store.signature = Some(SignatureBlock {
        alg: signer.alg().to_string(),
        certificates: signer.certificates().to_string(),
        payload_digest: digest,
        signature: BASE64.encode(signature),
        timestamp_authority: signer.tsa_uri().map(str::to_string),
    });
    Ok(())
}

/// Direct flow: sign `source` and write the signed asset to `dest`,
/// returning the raw manifest store bytes that were embedded.
///
/// Both streams are used synchronously and only for the duration of this
/// call; the destination is re-read afterwards when verify-after-sign is
/// enabled.
pub fn builder_sign(
    builder: &BuilderHandle,
    format: &str,
    source: &mut BoundaryStream<'_>,
    dest: &mut BoundaryStream<'_>,
    signer: &SignerHandle,
) -> Option<Vec<u8>> {
    to_handle(sign(builder, format, source, dest, signer))
}

fn sign(
    builder: &BuilderHandle,
    format: &str,
    source: &mut BoundaryStream<'_>,
    dest: &mut BoundaryStream<'_>,
    signer: &SignerHandle,
) -> EngineResult<Vec<u8>> {
    let mime = normalize_format(format)?;
    if mime == UNFORMATTED_FORMAT {
        return Err(Fault::invalid(
            "cannot sign directly to the unformatted container format",
        ));
    }

    let asset = read_all(source)?;
    let mut store = builder.compose_store()?;
    store.asset_hash = Some(sha256_hex(&asset));
    sign_store(&mut store, signer)?;
    let store_bytes = store.to_bytes()?;

    seek(dest, 0, SeekMode::Start)?;
    write_all(dest, &asset)?;
    if let Some(url) = &builder.remote_url {
        write_all(dest, &encode_trailer(TrailerKind::RemoteRef, url.as_bytes()))?;
    } else if !builder.no_embed {
        write_all(dest, &encode_trailer(TrailerKind::EmbeddedStore, &store_bytes))?;
    }
    flush(dest)?;

    if builder.verify_after_sign && !builder.no_embed && builder.remote_url.is_none() {
        let (kind, payload) = decode_trailer(dest)?
            .ok_or_else(|| Fault::engine("verification after signing found no manifest"))?;
        if kind != TrailerKind::EmbeddedStore || payload != store_bytes {
            return Err(Fault::engine(
                "verification after signing failed: written manifest does not match",
            ));
        }
    }
    tracing::debug!(format = mime, store_len = store_bytes.len(), "asset signed");
    Ok(store_bytes)
}

/// Reserve placeholder space for a signature the caller will insert itself.
///
/// Returns format-wrapped placeholder bytes of the exact size the signed
/// manifest will occupy; the reservation is remembered so
/// [`builder_sign_data_hashed_embeddable`] can pad its output to match.
pub fn builder_data_hashed_placeholder(
    builder: &mut BuilderHandle,
    reserved_size: u64,
    format: &str,
) -> Option<Vec<u8>> {
    to_handle(data_hashed_placeholder(builder, reserved_size, format))
}

fn data_hashed_placeholder(
    builder: &mut BuilderHandle,
    reserved_size: u64,
    format: &str,
) -> EngineResult<Vec<u8>> {
    let mime = normalize_format(format)?;
    let mut store = builder.compose_store()?;
    let digest = store.payload_digest()?;
    store.signature = Some(SignatureBlock {
        alg: "placeholder".to_string(),
        certificates: String::new(),
        payload_digest: digest,
        signature: BASE64.encode(vec![0u8; reserved_size as usize]),
        timestamp_authority: None,
    });
    let bytes = store.to_bytes()?;
    builder.placeholder = Some(Reservation {
        format: mime,
        store_len: bytes.len(),
    });
    Ok(wrap_embeddable(mime, bytes))
}

/// Data-hashed flow: sign over a hash description instead of streaming the
/// asset through the engine.
///
/// The description must carry a hash unless `asset` is provided, in which
/// case the engine computes the digest over the asset minus the exclusions.
pub fn builder_sign_data_hashed_embeddable(
    builder: &BuilderHandle,
    signer: &SignerHandle,
    data_hash_json: &str,
    format: &str,
    asset: Option<&mut BoundaryStream<'_>>,
) -> Option<Vec<u8>> {
    to_handle(sign_data_hashed(builder, signer, data_hash_json, format, asset))
}

fn sign_data_hashed(
    builder: &BuilderHandle,
    signer: &SignerHandle,
    data_hash_json: &str,
    format: &str,
    asset: Option<&mut BoundaryStream<'_>>,
) -> EngineResult<Vec<u8>> {
    let mime = normalize_format(format)?;
    let mut def: DataHashDef = serde_json::from_str(data_hash_json)
        .map_err(|e| Fault::invalid(format!("invalid data hash JSON: {e}")))?;
    if def.hash.is_none() {
        let stream = asset.ok_or_else(|| {
            Fault::invalid("data hash definition has no hash and no asset stream was provided")
        })?;
        def.hash = Some(hash_asset(stream, &def.exclusions)?);
    }

    let mut store = builder.compose_store()?;
    store.data_hash = Some(def);
    sign_store(&mut store, signer)?;
    let mut bytes = store.to_bytes()?;

    if let Some(reservation) = &builder.placeholder {
        if reservation.format == mime {
            if bytes.len() > reservation.store_len {
                return Err(Fault::engine(format!(
                    "signed manifest ({} bytes) does not fit the reserved placeholder ({} bytes)",
                    bytes.len(),
                    reservation.store_len
                )));
            }
            // Trailing whitespace keeps the store parseable while filling
            // the reservation exactly.
            bytes.resize(reservation.store_len, b' ');
        }
    }
    Ok(wrap_embeddable(mime, bytes))
}

fn wrap_embeddable(mime: &'static str, store_bytes: Vec<u8>) -> Vec<u8> {
    if mime == UNFORMATTED_FORMAT {
        store_bytes
    } else {
        encode_trailer(TrailerKind::EmbeddedStore, &store_bytes)
    }
}

/// Convert unformatted manifest bytes into the container for `format`.
pub fn format_embeddable(format: &str, data: &[u8]) -> Option<Vec<u8>> {
    to_handle(format_embeddable_inner(format, data))
}

fn format_embeddable_inner(format: &str, data: &[u8]) -> EngineResult<Vec<u8>> {
    let mime = normalize_format(format)?;
    if mime == UNFORMATTED_FORMAT {
        return Err(Fault::invalid("data is already in the unformatted container"));
    }
    // Round-trip check: the bytes must be a manifest store.
    ManifestStore::from_bytes(data)?;
    Ok(encode_trailer(TrailerKind::EmbeddedStore, data))
}

/// Serialized builder state for archive round-trips.
#[derive(Serialize, Deserialize)]
struct ArchiveDoc {
    definition: Value,
    actions: Vec<Value>,
    ingredients: Vec<Value>,
    resources: BTreeMap<String, String>,
    no_embed: bool,
    remote_url: Option<String>,
}

const ARCHIVE_MAGIC: [u8; 8] = *b"PVNARCH1";

/// Serialize the builder's manifest state to an archive stream.
pub fn builder_to_archive(builder: &BuilderHandle, dest: &mut BoundaryStream<'_>) -> i64 {
    to_count(to_archive(builder, dest).map(|()| 0))
}

fn to_archive(builder: &BuilderHandle, dest: &mut BoundaryStream<'_>) -> EngineResult<()> {
    let doc = ArchiveDoc {
        definition: builder.definition.clone(),
        actions: builder.actions.clone(),
        ingredients: builder.ingredients.clone(),
        resources: builder.resources.clone(),
        no_embed: builder.no_embed,
        remote_url: builder.remote_url.clone(),
    };
    let json = serde_json::to_vec(&doc)
        .map_err(|e| Fault::engine(format!("failed to serialize builder archive: {e}")))?;
    seek(dest, 0, SeekMode::Start)?;
    write_all(dest, &ARCHIVE_MAGIC)?;
    write_all(dest, &json)?;
    flush(dest)
}

/// Replace the builder's manifest state with an archived one. Consumes the
/// builder handle, succeed or fail; context-derived state is preserved.
pub fn builder_with_archive(
    builder: BuilderHandle,
    archive: &mut BoundaryStream<'_>,
) -> Option<BuilderHandle> {
    to_handle(with_archive(builder, archive))
}

fn with_archive(
    mut builder: BuilderHandle,
    archive: &mut BoundaryStream<'_>,
) -> EngineResult<BuilderHandle> {
    let bytes = read_all(archive)?;
    if bytes.len() < ARCHIVE_MAGIC.len() || bytes[..ARCHIVE_MAGIC.len()] != ARCHIVE_MAGIC {
        return Err(Fault::engine("stream is not a builder archive"));
    }
    let doc: ArchiveDoc = serde_json::from_slice(&bytes[ARCHIVE_MAGIC.len()..])
        .map_err(|e| Fault::engine(format!("malformed builder archive: {e}")))?;
    builder.definition = doc.definition;
    builder.actions = doc.actions;
    builder.ingredients = doc.ingredients;
    builder.resources = doc.resources;
    builder.no_embed = doc.no_embed;
    builder.remote_url = doc.remote_url;
    builder.placeholder = None;
    Ok(builder)
}

/// MIME types the builder can sign.
pub fn builder_supported_mime_types() -> Vec<String> {
    supported_mime_types()
}
