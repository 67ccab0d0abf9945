#![allow(dead_code)]

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::Signer as DalekSigner;
use ed25519_dalek::SigningKey;
use provena::{Signer, SigningAlg};

pub const TEST_CERT: &str =
    "-----BEGIN CERTIFICATE-----\nMIIBVzCCAQmgAwIBtest\n-----END CERTIFICATE-----\n";

/// A signer holding a freshly generated ed25519 key; the engine signs.
pub fn key_signer() -> Signer {
    let key = SigningKey::generate(&mut rand::thread_rng());
    let pem = key.to_pkcs8_pem(LineEnding::LF).unwrap();
    Signer::from_keys(TEST_CERT, &pem, SigningAlg::Ed25519, None).unwrap()
}

/// A signer whose callback signs with a freshly generated ed25519 key.
pub fn callback_signer() -> Signer {
    let key = SigningKey::generate(&mut rand::thread_rng());
    Signer::from_callback(
        move |data| Ok(key.sign(data).to_bytes().to_vec()),
        SigningAlg::Ed25519,
        TEST_CERT,
        None,
    )
    .unwrap()
}
