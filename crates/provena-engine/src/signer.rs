//! Signer handles.
//!
//! Two construction paths: a binding-side callback reached through the
//! [`SignFn`] shim, and engine-side signing from raw credential material
//! (currently ed25519 private keys in PKCS#8 PEM form).

use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{Signer as _, SigningKey};

use crate::abi::{SignFn, SignerToken};
use crate::fault::{to_handle, EngineResult, Fault};

/// Credential material for engine-side signing.
pub struct SignerInfo<'a> {
    pub alg: &'a str,
    pub certificates: &'a str,
    pub private_key: &'a str,
    /// Timestamp-authority URL; `None` means no timestamping.
    pub tsa_uri: Option<&'a str>,
}

/// Opaque signer handle.
#[derive(Debug)]
pub struct SignerHandle {
    kind: SignerKind,
    alg: String,
    certificates: String,
    tsa_uri: Option<String>,
    reserve_size: usize,
}

#[derive(Debug)]
enum SignerKind {
    Callback { shim: SignFn, token: SignerToken },
    Keys { key: SigningKey },
}

/// Extra bytes reserved beyond the signature and certificate chain for the
/// rest of the signature block.
const BLOCK_OVERHEAD: usize = 256;

/// Maximum raw signature size per algorithm.
fn alg_signature_size(alg: &str) -> EngineResult<usize> {
    match alg.to_ascii_lowercase().as_str() {
        "ed25519" => Ok(64),
        "es256" => Ok(72),
        "es384" => Ok(104),
        "ps256" => Ok(256),
        other => Err(Fault::invalid(format!("unknown signing algorithm: {other}"))),
    }
}

/// Reservation covering the whole signature block: the raw signature, the
/// certificate chain, the timestamp-authority URL, and block overhead.
fn reserve_for(alg: &str, certificates: &str, tsa_uri: Option<&str>) -> EngineResult<usize> {
    Ok(alg_signature_size(alg)?
        + certificates.len()
        + tsa_uri.map_or(0, str::len)
        + BLOCK_OVERHEAD)
}

fn check_certificates(certificates: &str) -> EngineResult<()> {
    if !certificates.contains("-----BEGIN") {
        return Err(Fault::engine("signing certificate is not PEM encoded"));
    }
    Ok(())
}

/// Create a signer that delegates to a binding-side callback.
///
/// The token is opaque to the engine; the shim knows how to get the
/// capability back out of it.
pub fn signer_create(
    token: SignerToken,
    shim: SignFn,
    alg: &str,
    certificates: &str,
    tsa_uri: Option<&str>,
) -> Option<SignerHandle> {
    to_handle(create(token, shim, alg, certificates, tsa_uri))
}

fn create(
    token: SignerToken,
    shim: SignFn,
    alg: &str,
    certificates: &str,
    tsa_uri: Option<&str>,
) -> EngineResult<SignerHandle> {
    check_certificates(certificates)?;
    Ok(SignerHandle {
        reserve_size: reserve_for(alg, certificates, tsa_uri)?,
        kind: SignerKind::Callback { shim, token },
        alg: alg.to_ascii_lowercase(),
        certificates: certificates.to_string(),
        tsa_uri: tsa_uri.map(str::to_string),
    })
}

/// Create a signer from raw credential material.
pub fn signer_from_info(info: &SignerInfo<'_>) -> Option<SignerHandle> {
    to_handle(from_info(info))
}

fn from_info(info: &SignerInfo<'_>) -> EngineResult<SignerHandle> {
    check_certificates(info.certificates)?;
    let reserve_size = reserve_for(info.alg, info.certificates, info.tsa_uri)?;
    if !info.alg.eq_ignore_ascii_case("ed25519") {
        return Err(Fault::engine(format!(
            "engine-side signing supports ed25519 only, not {}",
            info.alg
        )));
    }
    let key = SigningKey::from_pkcs8_pem(info.private_key)
        .map_err(|e| Fault::engine(format!("invalid ed25519 private key: {e}")))?;
    Ok(SignerHandle {
        reserve_size,
        kind: SignerKind::Keys { key },
        alg: info.alg.to_ascii_lowercase(),
        certificates: info.certificates.to_string(),
        tsa_uri: info.tsa_uri.map(str::to_string),
    })
}

/// Bytes to reserve for the signature block this signer will produce.
pub fn signer_reserve_size(signer: &SignerHandle) -> u64 {
    signer.reserve_size as u64
}

impl SignerHandle {
    pub(crate) fn alg(&self) -> &str {
        &self.alg
    }

    pub(crate) fn certificates(&self) -> &str {
        &self.certificates
    }

    pub(crate) fn tsa_uri(&self) -> Option<&str> {
        self.tsa_uri.as_deref()
    }

    pub(crate) fn reserve(&self) -> usize {
        self.reserve_size
    }

    /// Produce a signature over `data`, no longer than the reserve size.
    pub(crate) fn sign_payload(&self, data: &[u8]) -> EngineResult<Vec<u8>> {
        match &self.kind {
            SignerKind::Keys { key } => Ok(key.sign(data).to_bytes().to_vec()),
            SignerKind::Callback { shim, token } => {
                let mut out = vec![0u8; self.reserve_size];
                let len = shim(token, data, &mut out, self.reserve_size);
                if len < 0 {
                    // The shim already recorded the category.
                    return Err(Fault::Recorded);
                }
                let len = len as usize;
                if len > self.reserve_size {
                    return Err(Fault::engine(
                        "signing callback reported a length beyond its buffer",
                    ));
                }
                out.truncate(len);
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::{take_last_error, test_guard};
    use ed25519_dalek::pkcs8::EncodePrivateKey;
    use ed25519_dalek::Verifier;

    const TEST_CERT: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";

    #[test]
    fn keys_signer_signs_verifiably() {
        let key = SigningKey::generate(&mut rand::thread_rng());
        let pem = key
            .to_pkcs8_pem(ed25519_dalek::pkcs8::spki::der::pem::LineEnding::LF)
            .unwrap();
        let signer = signer_from_info(&SignerInfo {
            alg: "ed25519",
            certificates: TEST_CERT,
            private_key: &pem,
            tsa_uri: None,
        })
        .unwrap();

        assert_eq!(
            signer_reserve_size(&signer),
            (64 + TEST_CERT.len() + 256) as u64
        );
        let sig = signer.sign_payload(b"payload").unwrap();
        let sig = ed25519_dalek::Signature::from_slice(&sig).unwrap();
        key.verifying_key().verify(b"payload", &sig).unwrap();
    }

    #[test]
    fn non_pem_certificate_is_rejected() {
        let _serial = test_guard();
        let result = signer_from_info(&SignerInfo {
            alg: "ed25519",
            certificates: "not a certificate",
            private_key: "",
            tsa_uri: None,
        });
        assert!(result.is_none());
        let err = take_last_error().unwrap();
        assert!(err.message.contains("PEM"));
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let _serial = test_guard();
        let result = signer_from_info(&SignerInfo {
            alg: "rsa4096",
            certificates: TEST_CERT,
            private_key: "",
            tsa_uri: None,
        });
        assert!(result.is_none());
        assert!(take_last_error().unwrap().message.contains("rsa4096"));
    }
}
