//! Signers: caller-supplied signing callbacks and engine-side key signing.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;

use provena_engine::{fault, FaultCode, SignerHandle, SignerInfo, SignerToken};

use crate::error::{boundary_handle, Error, Result};
use crate::handle::Owned;

/// Supported signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlg {
    Ed25519,
    Es256,
    Es384,
    Ps256,
}

impl SigningAlg {
    pub fn as_str(self) -> &'static str {
        match self {
            SigningAlg::Ed25519 => "ed25519",
            SigningAlg::Es256 => "es256",
            SigningAlg::Es384 => "es384",
            SigningAlg::Ps256 => "ps256",
        }
    }
}

impl FromStr for SigningAlg {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" => Ok(SigningAlg::Ed25519),
            "es256" => Ok(SigningAlg::Es256),
            "es384" => Ok(SigningAlg::Es384),
            "ps256" => Ok(SigningAlg::Ps256),
            other => Err(Error::InvalidArgument(format!(
                "unknown signing algorithm: {other}"
            ))),
        }
    }
}

/// The signing capability stored behind the engine's opaque token.
///
/// The callback receives the payload to sign and returns the raw signature
/// bytes, or a message describing why it could not sign.
struct CallbackCapability {
    callback: Box<dyn Fn(&[u8]) -> std::result::Result<Vec<u8>, String> + Send + Sync>,
}

/// The one fixed shim the engine invokes for every callback signer.
///
/// Nothing may propagate across the boundary: callback failures and panics
/// are converted to the sentinel with the category in the last-error slot.
fn callback_shim(token: &SignerToken, data: &[u8], out: &mut [u8], max_len: usize) -> i64 {
    let Some(capability) = token.downcast_ref::<CallbackCapability>() else {
        return fault(FaultCode::Engine, "signer token holds no signing capability");
    };
    if data.is_empty() || out.is_empty() || max_len == 0 {
        return fault(FaultCode::InvalidArgument, "empty signing buffer");
    }
    match catch_unwind(AssertUnwindSafe(|| (capability.callback)(data))) {
        Ok(Ok(signature)) => {
            if signature.len() > max_len.min(out.len()) {
                return fault(
                    FaultCode::NoBufferSpace,
                    format!(
                        "signature is {} bytes but only {} were reserved",
                        signature.len(),
                        max_len
                    ),
                );
            }
            out[..signature.len()].copy_from_slice(&signature);
            signature.len() as i64
        }
        Ok(Err(message)) => fault(FaultCode::Engine, message),
        Err(_) => fault(FaultCode::Engine, "signing callback panicked"),
    }
}

/// Signs manifest payloads during builder sign operations.
#[derive(Debug)]
pub struct Signer {
    inner: Owned<SignerHandle>,
}

impl Signer {
    /// Create a signer around a caller-supplied callback.
    ///
    /// An empty timestamp-authority URL is treated as absent.
    pub fn from_callback<F>(
        callback: F,
        alg: SigningAlg,
        certificates: &str,
        tsa_uri: Option<&str>,
    ) -> Result<Self>
    where
        F: Fn(&[u8]) -> std::result::Result<Vec<u8>, String> + Send + Sync + 'static,
    {
        let tsa_uri = tsa_uri.filter(|uri| !uri.is_empty());
        let token = SignerToken::new(CallbackCapability {
            callback: Box::new(callback),
        });
        let handle = boundary_handle(|| {
            provena_engine::signer_create(token, callback_shim, alg.as_str(), certificates, tsa_uri)
        })?;
        Ok(Self {
            inner: Owned::new(handle, "signer"),
        })
    }

    /// Create a signer from raw credential material; the engine signs.
    pub fn from_keys(
        certificates: &str,
        private_key: &str,
        alg: SigningAlg,
        tsa_uri: Option<&str>,
    ) -> Result<Self> {
        let tsa_uri = tsa_uri.filter(|uri| !uri.is_empty());
        let handle = boundary_handle(|| {
            provena_engine::signer_from_info(&SignerInfo {
                alg: alg.as_str(),
                certificates,
                private_key,
                tsa_uri,
            })
        })?;
        Ok(Self {
            inner: Owned::new(handle, "signer"),
        })
    }

    /// Bytes to reserve for this signer's signature block, for the
    /// data-hashed placeholder flow.
    pub fn reserve_size(&self) -> Result<u64> {
        Ok(provena_engine::signer_reserve_size(self.inner.get()?))
    }

    pub fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }

    pub(crate) fn handle(&self) -> Result<&SignerHandle> {
        self.inner.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CERT: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";

    #[test]
    fn alg_parses_case_insensitively() {
        assert_eq!(SigningAlg::from_str("Ed25519").unwrap(), SigningAlg::Ed25519);
        assert_eq!(SigningAlg::from_str("ES256").unwrap(), SigningAlg::Es256);
        assert!(SigningAlg::from_str("rsa").is_err());
    }

    #[test]
    fn empty_tsa_uri_is_treated_as_absent() {
        let signer = Signer::from_callback(
            |_data| Ok(vec![0u8; 64]),
            SigningAlg::Ed25519,
            TEST_CERT,
            Some(""),
        )
        .unwrap();
        assert!(signer.is_valid());
    }

    #[test]
    fn bad_certificates_fail_construction() {
        let err = Signer::from_callback(
            |_data| Ok(Vec::new()),
            SigningAlg::Ed25519,
            "no pem here",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Engine { .. }));
    }
}
