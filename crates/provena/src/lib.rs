//! Safe, idiomatic API over the provenance manifest engine.
//!
//! The engine (`provena-engine`) exposes a boundary-style surface of opaque
//! handles, sentinel returns, and an ambient last-error slot. This crate
//! wraps that surface in ordinary Rust types: [`Result`]s instead of
//! sentinels, ownership instead of handle-invalidation rules, and `std::io`
//! streams instead of operation tables.
//!
//! ```no_run
//! use provena::{Builder, Context, Reader, Signer, SigningAlg};
//!
//! # fn run(certs: &str, key: &str) -> provena::Result<()> {
//! let context = Context::new()?;
//! let signer = Signer::from_keys(certs, key, SigningAlg::Ed25519, None)?;
//!
//! let mut builder = Builder::from_json(&context, r#"{"title": "sunset"}"#)?;
//! builder.add_action(r#"{"action": "c2pa.created"}"#)?;
//! builder.sign_file("sunset.jpg", "signed/sunset.jpg", &signer)?;
//!
//! let reader = Reader::from_file(&context, "signed/sunset.jpg")?;
//! println!("{}", reader.json()?);
//! # Ok(())
//! # }
//! ```

mod builder;
mod context;
mod error;
mod handle;
mod reader;
mod settings;
mod signer;
mod stream;

pub use builder::Builder;
pub use context::{Context, ContextBuilder, ContextProvider};
pub use error::{Error, Result};
pub use reader::Reader;
pub use settings::Settings;
pub use signer::{Signer, SigningAlg};

/// Version of the underlying engine.
pub fn version() -> String {
    provena_engine::version()
}
