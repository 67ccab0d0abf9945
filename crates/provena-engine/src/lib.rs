//! Content-provenance engine behind a boundary-style API.
//!
//! Everything here is reached through opaque handles and count-returning
//! operations so that a thin binding layer can sit in front of it. Streams
//! and signing callbacks cross into the engine through the operation tables
//! in [`abi`]; failures come back as null handles or the negative sentinel,
//! with the category in the last-error slot of [`fault`].
//!
//! The `provena` crate is the safe, idiomatic face of this engine; use that
//! unless you are building a binding of your own.

mod abi;
mod builder;
mod fault;
mod reader;
mod settings;
mod signer;
mod store;

pub use abi::{
    BoundaryStream, DuplexStream, FlushFn, InputStream, OutputStream, ReadFn, SeekFn, SeekMode,
    SignFn, SignerToken, StreamOps, StreamToken, WriteFn,
};
pub use builder::{
    builder_add_action, builder_add_ingredient, builder_add_resource,
    builder_data_hashed_placeholder, builder_from_context, builder_set_no_embed,
    builder_set_remote_url, builder_sign, builder_sign_data_hashed_embeddable,
    builder_supported_mime_types, builder_to_archive, builder_with_archive,
    builder_with_definition, format_embeddable, BuilderHandle,
};
pub use fault::{fault, set_last_error, take_last_error, FaultCode, LastError, SENTINEL};
pub use reader::{
    reader_from_context, reader_is_embedded, reader_json, reader_remote_url,
    reader_resource_to_stream, reader_supported_mime_types, reader_with_stream, ReaderHandle,
};
pub use settings::{
    context_builder_build, context_builder_new, context_builder_set_settings, context_new,
    settings_new, settings_set_value, settings_update_from_string, ContextBuilderHandle,
    ContextHandle, SettingsHandle,
};
pub use signer::{
    signer_create, signer_from_info, signer_reserve_size, SignerHandle, SignerInfo,
};
pub use store::UNFORMATTED_FORMAT;

/// Engine version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine version, as reported across the boundary.
pub fn version() -> String {
    VERSION.to_string()
}
