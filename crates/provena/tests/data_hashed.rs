//! The data-hashed signing flow and signer failure categories.

mod common;

use std::io::Cursor;

use anyhow::Result;
use provena::{Builder, Context, Error, Signer, SigningAlg};

#[test]
fn placeholder_bounds_the_signed_manifest() -> Result<()> {
    let context = Context::new()?;
    let signer = common::key_signer();

    let mut builder = Builder::from_json(&context, r#"{"title": "dh"}"#)?;
    let reserved = signer.reserve_size()?;
    let placeholder = builder.data_hashed_placeholder(reserved, "image/jpeg")?;

    let hash_json = r#"{"exclusions": [{"start": 20, "length": 100}], "name": "manifest gap"}"#;
    let mut asset = Cursor::new(vec![7u8; 200]);
    let signed =
        builder.sign_data_hashed_embeddable_with_asset(&signer, hash_json, "image/jpeg", &mut asset)?;

    assert_eq!(
        signed.len(),
        placeholder.len(),
        "signed output must occupy exactly the reserved space"
    );
    Ok(())
}

#[test]
fn missing_hash_without_an_asset_is_an_argument_error() {
    let context = Context::new().unwrap();
    let signer = common::key_signer();
    let builder = Builder::from_json(&context, r#"{"title": "dh"}"#).unwrap();

    let err = builder
        .sign_data_hashed_embeddable(&signer, r#"{"exclusions": []}"#, "image/jpeg")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn unformatted_output_can_be_wrapped_later() -> Result<()> {
    let context = Context::new()?;
    let signer = common::key_signer();
    let builder = Builder::from_json(&context, r#"{"title": "wrap"}"#)?;

    let hash_json = r#"{"hash": "sha256:0011"}"#;
    let raw = builder.sign_data_hashed_embeddable(
        &signer,
        hash_json,
        "application/x-provena-manifest",
    )?;
    let value: serde_json::Value = serde_json::from_slice(&raw)?;
    assert_eq!(value["data_hash"]["hash"], "sha256:0011");

    let wrapped = Builder::format_embeddable("image/jpeg", &raw)?;
    assert!(wrapped.len() > raw.len());
    assert_eq!(&wrapped[..raw.len()], &raw[..]);

    let err = Builder::format_embeddable("image/jpeg", b"garbage").unwrap_err();
    assert!(matches!(err, Error::Engine { .. }));
    Ok(())
}

#[test]
fn oversized_callback_signature_is_a_buffer_error() {
    let signer = Signer::from_callback(
        |_data| Ok(vec![0u8; 100_000]),
        SigningAlg::Ed25519,
        common::TEST_CERT,
        None,
    )
    .unwrap();
    let context = Context::new().unwrap();
    let builder = Builder::from_json(&context, r#"{"title": "big"}"#).unwrap();

    let mut source = Cursor::new(b"asset".to_vec());
    let mut dest = Cursor::new(Vec::new());
    let err = builder
        .sign("png", &mut source, &mut dest, &signer)
        .unwrap_err();
    assert!(matches!(err, Error::NoBufferSpace));
}

#[test]
fn failing_callback_surfaces_its_message() {
    let signer = Signer::from_callback(
        |_data| Err("hsm offline".to_string()),
        SigningAlg::Ed25519,
        common::TEST_CERT,
        None,
    )
    .unwrap();
    let context = Context::new().unwrap();
    let builder = Builder::from_json(&context, r#"{"title": "err"}"#).unwrap();

    let mut source = Cursor::new(b"asset".to_vec());
    let mut dest = Cursor::new(Vec::new());
    let err = builder
        .sign("png", &mut source, &mut dest, &signer)
        .unwrap_err();
    assert!(err.to_string().contains("hsm offline"));
}

#[test]
fn panicking_callback_becomes_an_engine_error() {
    let signer = Signer::from_callback(
        |_data| -> std::result::Result<Vec<u8>, String> { panic!("boom") },
        SigningAlg::Ed25519,
        common::TEST_CERT,
        None,
    )
    .unwrap();
    let context = Context::new().unwrap();
    let builder = Builder::from_json(&context, r#"{"title": "panic"}"#).unwrap();

    let mut source = Cursor::new(b"asset".to_vec());
    let mut dest = Cursor::new(Vec::new());
    let err = builder
        .sign("png", &mut source, &mut dest, &signer)
        .unwrap_err();
    assert!(err.to_string().contains("panicked"));
}
