//! End-to-end signing and reading through the direct flow.

mod common;

use std::io::Cursor;

use anyhow::Result;
use provena::{Builder, Context, Error, Reader};

#[test]
fn sign_and_read_roundtrip() -> Result<()> {
    let context = Context::new()?;
    let signer = common::key_signer();

    let mut builder = Builder::from_json(&context, r#"{"title": "demo"}"#)?;
    builder.add_action(r#"{"action": "c2pa.created"}"#)?;
    let mut thumbnail = Cursor::new(b"thumbnail-bytes".to_vec());
    builder.add_resource("thumbnail", &mut thumbnail)?;
    let mut ingredient_asset = Cursor::new(vec![1u8, 2, 3]);
    builder.add_ingredient(r#"{"title": "source image"}"#, "png", &mut ingredient_asset)?;

    let asset = b"original jpeg bytes".to_vec();
    let mut source = Cursor::new(asset.clone());
    let mut dest = Cursor::new(Vec::new());
    let store = builder.sign("image/jpeg", &mut source, &mut dest, &signer)?;
    assert!(!store.is_empty());

    let signed = dest.into_inner();
    assert!(signed.starts_with(&asset), "asset bytes must be preserved");
    assert!(signed.len() > asset.len());

    let mut reopened = Cursor::new(signed);
    let reader = Reader::new(&context, "jpg", &mut reopened)?;
    assert!(reader.is_embedded()?);
    assert_eq!(reader.remote_url()?, None);

    let value: serde_json::Value = serde_json::from_str(&reader.json()?)?;
    assert_eq!(value["manifest"]["title"], "demo");
    assert_eq!(value["manifest"]["actions"][0]["action"], "c2pa.created");
    assert_eq!(value["manifest"]["ingredients"][0]["title"], "source image");
    assert_eq!(value["manifest"]["ingredients"][0]["format"], "image/png");

    let mut out = Cursor::new(Vec::new());
    let written = reader.resource("thumbnail", &mut out)?;
    assert_eq!(written, b"thumbnail-bytes".len() as u64);
    assert_eq!(out.into_inner(), b"thumbnail-bytes");

    let err = reader
        .resource("missing", &mut Cursor::new(Vec::new()))
        .unwrap_err();
    assert!(matches!(err, Error::Engine { .. }));
    assert!(err.to_string().contains("missing"));
    Ok(())
}

#[test]
fn callback_signer_produces_the_same_shape() -> Result<()> {
    let context = Context::new()?;
    let signer = common::callback_signer();

    let builder = Builder::from_json(&context, r#"{"title": "cb"}"#)?;
    let mut source = Cursor::new(b"asset".to_vec());
    let mut dest = Cursor::new(Vec::new());
    let store = builder.sign("png", &mut source, &mut dest, &signer)?;

    let value: serde_json::Value = serde_json::from_slice(&store)?;
    assert_eq!(value["signature"]["alg"], "ed25519");
    assert!(value["signature"]["signature"].as_str().is_some());
    Ok(())
}

#[test]
fn sign_file_creates_destination_directories() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = dir.path().join("photo.jpg");
    std::fs::write(&source, b"jpeg data")?;
    let dest = dir.path().join("signed/out/photo.jpg");

    let thumb = dir.path().join("thumb.png");
    std::fs::write(&thumb, b"tiny png")?;

    let context = Context::new()?;
    let signer = common::key_signer();
    let mut builder = Builder::from_json(&context, r#"{"title": "file"}"#)?;
    builder.add_resource_file("thumbnail", &thumb)?;
    builder.add_ingredient_file(r#"{"title": "raw capture"}"#, &thumb)?;
    builder.sign_file(&source, &dest, &signer)?;

    let reader = Reader::from_file(&context, &dest)?;
    assert!(reader.is_embedded()?);
    let value: serde_json::Value = serde_json::from_str(&reader.json()?)?;
    assert_eq!(value["manifest"]["ingredients"][0]["format"], "image/png");

    let resource_out = dir.path().join("resources/none.bin");
    assert!(reader.resource_to_file("nope", &resource_out).is_err());
    Ok(())
}

#[test]
fn claim_generator_comes_from_context_settings() -> Result<()> {
    let context = Context::from_json(r#"{"builder": {"claim_generator": "testapp/1.0"}}"#)?;
    let signer = common::key_signer();

    let builder = Builder::from_json(&context, r#"{"title": "cg"}"#)?;
    let mut source = Cursor::new(b"asset".to_vec());
    let mut dest = Cursor::new(Vec::new());
    let store = builder.sign("png", &mut source, &mut dest, &signer)?;

    let value: serde_json::Value = serde_json::from_slice(&store)?;
    assert_eq!(value["claim_generator"], "testapp/1.0");
    Ok(())
}

#[test]
fn remote_url_embeds_a_reference_instead_of_the_store() -> Result<()> {
    let context = Context::new()?;
    let signer = common::key_signer();

    let mut builder = Builder::from_json(&context, r#"{"title": "remote"}"#)?;
    builder.set_remote_url("https://manifests.example/abc")?;
    let mut source = Cursor::new(b"asset".to_vec());
    let mut dest = Cursor::new(Vec::new());
    builder.sign("png", &mut source, &mut dest, &signer)?;

    let mut reopened = Cursor::new(dest.into_inner());
    let reader = Reader::new(&context, "png", &mut reopened)?;
    assert!(!reader.is_embedded()?);
    assert_eq!(
        reader.remote_url()?.as_deref(),
        Some("https://manifests.example/abc")
    );
    let err = reader.json().unwrap_err();
    assert!(matches!(err, Error::Engine { .. }));
    Ok(())
}

#[test]
fn no_embed_leaves_the_asset_untouched() -> Result<()> {
    let context = Context::new()?;
    let signer = common::key_signer();

    let mut builder = Builder::from_json(&context, r#"{"title": "external"}"#)?;
    builder.set_no_embed()?;
    let asset = b"asset".to_vec();
    let mut source = Cursor::new(asset.clone());
    let mut dest = Cursor::new(Vec::new());
    let store = builder.sign("png", &mut source, &mut dest, &signer)?;
    assert!(!store.is_empty(), "the store is still returned to the caller");
    assert_eq!(dest.get_ref(), &asset);

    let mut reopened = Cursor::new(dest.into_inner());
    let err = Reader::new(&context, "png", &mut reopened).unwrap_err();
    assert!(err.to_string().contains("no manifest store"));
    Ok(())
}

#[test]
fn invalid_remote_url_is_rejected() {
    let context = Context::new().unwrap();
    let mut builder = Builder::new(&context).unwrap();
    let err = builder.set_remote_url("not-a-url").unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(builder.is_valid(), "in-place failures keep the handle usable");
}
