//! Manifest readers.

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use provena_engine::ReaderHandle;

use crate::builder::format_from_path;
use crate::context::{require_context, ContextProvider};
use crate::error::{boundary_count, boundary_handle, Result};
use crate::handle::Owned;
use crate::stream;

/// Reads the provenance manifest out of a signed asset.
///
/// The manifest is extracted when the reader is constructed; the source
/// stream is not used afterwards.
#[derive(Debug)]
pub struct Reader {
    inner: Owned<ReaderHandle>,
}

impl Reader {
    /// Extract the manifest from an asset stream.
    pub fn new<R: Read + Seek>(
        context: &impl ContextProvider,
        format: &str,
        source: &mut R,
    ) -> Result<Self> {
        let context = require_context(context)?;
        let empty = boundary_handle(|| provena_engine::reader_from_context(context))?;
        let mut stream = stream::input(source);
        let handle =
            boundary_handle(|| provena_engine::reader_with_stream(empty, format, &mut stream))?;
        Ok(Self {
            inner: Owned::new(handle, "reader"),
        })
    }

    /// Extract the manifest from a file, inferring the format from its
    /// extension.
    pub fn from_file(context: &impl ContextProvider, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = format_from_path(path)?;
        let mut file = File::open(path)?;
        Self::new(context, &format, &mut file)
    }

    /// The manifest store as JSON.
    ///
    /// Fails when the asset carries only a remote reference; fetch the URL
    /// from [`remote_url`](Reader::remote_url) and read the result instead.
    pub fn json(&self) -> Result<String> {
        let handle = self.inner.get()?;
        boundary_handle(|| provena_engine::reader_json(handle))
    }

    /// Whether the asset carried the manifest itself rather than a remote
    /// reference.
    pub fn is_embedded(&self) -> Result<bool> {
        Ok(provena_engine::reader_is_embedded(self.inner.get()?))
    }

    /// The remote manifest URL, when the asset carries a reference.
    pub fn remote_url(&self) -> Result<Option<String>> {
        Ok(provena_engine::reader_remote_url(self.inner.get()?))
    }

    /// Write the resource stored under `uri` to a stream, returning the
    /// number of bytes written.
    pub fn resource<W: Write + Seek>(&self, uri: &str, dest: &mut W) -> Result<u64> {
        let handle = self.inner.get()?;
        let mut stream = stream::output(dest);
        let written =
            boundary_count(|| provena_engine::reader_resource_to_stream(handle, uri, &mut stream))?;
        Ok(written as u64)
    }

    /// Write the resource stored under `uri` to a file, creating parent
    /// directories as needed.
    pub fn resource_to_file(&self, uri: &str, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = File::create(path)?;
        self.resource(uri, &mut file)
    }

    /// MIME types the reader accepts.
    pub fn supported_mime_types() -> Vec<String> {
        provena_engine::reader_supported_mime_types()
    }

    /// Whether the underlying handle is still usable.
    pub fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }
}
