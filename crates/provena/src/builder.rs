//! Manifest builders.
//!
//! A builder accumulates a manifest definition, actions, ingredients, and
//! resources, then signs an asset with either the direct flow ([`sign`] and
//! [`sign_file`]) or the data-hashed flow ([`data_hashed_placeholder`] plus
//! [`sign_data_hashed_embeddable`]).
//!
//! [`sign`]: Builder::sign
//! [`sign_file`]: Builder::sign_file
//! [`data_hashed_placeholder`]: Builder::data_hashed_placeholder
//! [`sign_data_hashed_embeddable`]: Builder::sign_data_hashed_embeddable

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::path::Path;

use provena_engine::BuilderHandle;

use crate::context::{require_context, ContextProvider};
use crate::error::{boundary_count, boundary_handle, Error, Result};
use crate::handle::Owned;
use crate::signer::Signer;
use crate::stream;

/// Infer the engine format identifier from a file extension.
pub(crate) fn format_from_path(path: &Path) -> Result<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "cannot infer a format from path {}",
                path.display()
            ))
        })
}

/// Builds and signs provenance manifests.
#[derive(Debug)]
pub struct Builder {
    inner: Owned<BuilderHandle>,
}

impl Builder {
    /// Create an empty builder.
    pub fn new(context: &impl ContextProvider) -> Result<Self> {
        let context = require_context(context)?;
        let handle = boundary_handle(|| provena_engine::builder_from_context(context))?;
        Ok(Self {
            inner: Owned::new(handle, "builder"),
        })
    }

    /// Create a builder with a manifest definition.
    pub fn from_json(context: &impl ContextProvider, manifest_json: &str) -> Result<Self> {
        let mut builder = Self::new(context)?;
        builder.set_definition(manifest_json)?;
        Ok(builder)
    }

    /// Create a builder from a previously written archive.
    pub fn from_archive<R: Read + Seek>(
        context: &impl ContextProvider,
        archive: &mut R,
    ) -> Result<Self> {
        let mut builder = Self::new(context)?;
        builder.use_archive(archive)?;
        Ok(builder)
    }

    /// Set or replace the manifest definition.
    ///
    /// On failure the builder is unusable; previously attached actions,
    /// ingredients, and resources survive success.
    pub fn set_definition(&mut self, manifest_json: &str) -> Result<&mut Self> {
        self.inner.consume_update(|handle| {
            boundary_handle(|| provena_engine::builder_with_definition(handle, manifest_json))
        })?;
        Ok(self)
    }

    /// Replace the builder's manifest state with an archived one.
    ///
    /// On failure the builder is unusable.
    pub fn use_archive<R: Read + Seek>(&mut self, archive: &mut R) -> Result<&mut Self> {
        self.inner.consume_update(|handle| {
            let mut stream = stream::input(archive);
            boundary_handle(|| provena_engine::builder_with_archive(handle, &mut stream))
        })?;
        Ok(self)
    }

    /// Serialize the builder's manifest state to an archive stream.
    pub fn to_archive<W: Write + Seek>(&self, dest: &mut W) -> Result<()> {
        let handle = self.inner.get()?;
        let mut stream = stream::output(dest);
        boundary_count(|| provena_engine::builder_to_archive(handle, &mut stream))?;
        Ok(())
    }

    /// Serialize the builder's manifest state to an archive file, creating
    /// parent directories as needed.
    pub fn to_archive_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = File::create(path)?;
        self.to_archive(&mut file)
    }

    /// Create a builder from an archive file.
    pub fn from_archive_file(
        context: &impl ContextProvider,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let mut file = File::open(path)?;
        Self::from_archive(context, &mut file)
    }

    /// Sign without embedding; the caller hosts the manifest externally.
    pub fn set_no_embed(&mut self) -> Result<&mut Self> {
        provena_engine::builder_set_no_embed(self.inner.get_mut()?);
        Ok(self)
    }

    /// Record the URL where the manifest will be hosted; signing embeds a
    /// reference to it instead of the manifest itself.
    pub fn set_remote_url(&mut self, url: &str) -> Result<&mut Self> {
        let handle = self.inner.get_mut()?;
        boundary_count(|| provena_engine::builder_set_remote_url(handle, url))?;
        Ok(self)
    }

    /// Attach a resource (a thumbnail, for example) under `uri`.
    pub fn add_resource<R: Read + Seek>(&mut self, uri: &str, source: &mut R) -> Result<&mut Self> {
        let handle = self.inner.get_mut()?;
        let mut stream = stream::input(source);
        boundary_count(|| provena_engine::builder_add_resource(handle, uri, &mut stream))?;
        Ok(self)
    }

    /// Attach a resource read from a file.
    pub fn add_resource_file(&mut self, uri: &str, path: impl AsRef<Path>) -> Result<&mut Self> {
        let mut file = File::open(path)?;
        self.add_resource(uri, &mut file)
    }

    /// Attach an ingredient described by JSON metadata plus its asset.
    pub fn add_ingredient<R: Read + Seek>(
        &mut self,
        ingredient_json: &str,
        format: &str,
        source: &mut R,
    ) -> Result<&mut Self> {
        let handle = self.inner.get_mut()?;
        let mut stream = stream::input(source);
        boundary_count(|| {
            provena_engine::builder_add_ingredient(handle, ingredient_json, format, &mut stream)
        })?;
        Ok(self)
    }

    /// Attach an ingredient from a file, inferring the format from its
    /// extension.
    pub fn add_ingredient_file(
        &mut self,
        ingredient_json: &str,
        path: impl AsRef<Path>,
    ) -> Result<&mut Self> {
        let path = path.as_ref();
        let format = format_from_path(path)?;
        let mut file = File::open(path)?;
        self.add_ingredient(ingredient_json, &format, &mut file)
    }

    /// Record an action, e.g. `{"action": "c2pa.edited"}`.
    pub fn add_action(&mut self, action_json: &str) -> Result<&mut Self> {
        let handle = self.inner.get_mut()?;
        boundary_count(|| provena_engine::builder_add_action(handle, action_json))?;
        Ok(self)
    }

    /// Sign `source` and write the signed asset to `dest`, returning the raw
    /// manifest store bytes that were embedded.
    ///
    /// The destination must be readable as well as writable; the engine
    /// re-reads it to verify the embedding when verify-after-sign is on.
    pub fn sign<R, D>(
        &self,
        format: &str,
        source: &mut R,
        dest: &mut D,
        signer: &Signer,
    ) -> Result<Vec<u8>>
    where
        R: Read + Seek,
        D: Read + Write + Seek,
    {
        let handle = self.inner.get()?;
        let signer = signer.handle()?;
        let mut src = stream::input(source);
        let mut dst = stream::duplex(dest);
        boundary_handle(|| provena_engine::builder_sign(handle, format, &mut src, &mut dst, signer))
    }

    /// Sign the file at `source` into `dest`, inferring the format from the
    /// source extension and creating parent directories as needed.
    pub fn sign_file(
        &self,
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        signer: &Signer,
    ) -> Result<Vec<u8>> {
        let source = source.as_ref();
        let dest = dest.as_ref();
        let format = format_from_path(source)?;
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut src = File::open(source)?;
        let mut dst = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(dest)?;
        self.sign(&format, &mut src, &mut dst, signer)
    }

    /// Reserve placeholder space for the data-hashed flow.
    ///
    /// The returned bytes occupy exactly the space the signed manifest will;
    /// use [`Signer::reserve_size`] for `reserved_size`.
    pub fn data_hashed_placeholder(&mut self, reserved_size: u64, format: &str) -> Result<Vec<u8>> {
        let handle = self.inner.get_mut()?;
        boundary_handle(|| {
            provena_engine::builder_data_hashed_placeholder(handle, reserved_size, format)
        })
    }

    /// Sign a data-hash description whose digest the caller computed.
    pub fn sign_data_hashed_embeddable(
        &self,
        signer: &Signer,
        data_hash_json: &str,
        format: &str,
    ) -> Result<Vec<u8>> {
        let handle = self.inner.get()?;
        let signer = signer.handle()?;
        boundary_handle(|| {
            provena_engine::builder_sign_data_hashed_embeddable(
                handle,
                signer,
                data_hash_json,
                format,
                None,
            )
        })
    }

    /// Sign a data-hash description, letting the engine digest the asset
    /// stream minus the description's exclusions.
    pub fn sign_data_hashed_embeddable_with_asset<R: Read + Seek>(
        &self,
        signer: &Signer,
        data_hash_json: &str,
        format: &str,
        asset: &mut R,
    ) -> Result<Vec<u8>> {
        let handle = self.inner.get()?;
        let signer = signer.handle()?;
        let mut stream = stream::input(asset);
        boundary_handle(|| {
            provena_engine::builder_sign_data_hashed_embeddable(
                handle,
                signer,
                data_hash_json,
                format,
                Some(&mut stream),
            )
        })
    }

    /// Convert unformatted manifest bytes into the container for `format`.
    pub fn format_embeddable(format: &str, data: &[u8]) -> Result<Vec<u8>> {
        boundary_handle(|| provena_engine::format_embeddable(format, data))
    }

    /// MIME types the builder can sign.
    pub fn supported_mime_types() -> Vec<String> {
        provena_engine::builder_supported_mime_types()
    }

    /// Whether the underlying handle is still usable.
    pub fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_inference_lowercases_extensions() {
        assert_eq!(format_from_path(Path::new("photo.JPG")).unwrap(), "jpg");
        assert!(format_from_path(Path::new("no_extension")).is_err());
    }

    #[test]
    fn mime_types_include_the_unformatted_container() {
        let mimes = Builder::supported_mime_types();
        assert!(mimes.iter().any(|m| m == "image/jpeg"));
        assert!(mimes.iter().any(|m| m == provena_engine::UNFORMATTED_FORMAT));
    }
}
