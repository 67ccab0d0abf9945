//! Handle-consumption rules for fallible, state-replacing operations.

mod common;

use std::io::Cursor;

use provena::{Builder, Context, Error, Reader};

#[test]
fn failed_definition_consumes_the_builder() {
    let context = Context::new().unwrap();
    let mut builder = Builder::new(&context).unwrap();

    let err = builder.set_definition("not json").unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(!builder.is_valid());

    let err = builder.add_action(r#"{"action": "c2pa.created"}"#).unwrap_err();
    assert!(matches!(err, Error::InvalidHandle { what: "builder" }));
    assert!(err.to_string().contains("consumed"));
}

#[test]
fn failed_archive_load_consumes_the_builder() {
    let context = Context::new().unwrap();
    let mut builder = Builder::from_json(&context, r#"{"title": "t"}"#).unwrap();

    let mut bogus = Cursor::new(b"junk".to_vec());
    assert!(builder.use_archive(&mut bogus).is_err());
    assert!(!builder.is_valid());
}

#[test]
fn successful_definition_keeps_the_builder_usable() {
    let context = Context::new().unwrap();
    let mut builder = Builder::new(&context).unwrap();
    builder
        .set_definition(r#"{"title": "first"}"#)
        .unwrap()
        .set_definition(r#"{"title": "second"}"#)
        .unwrap();
    assert!(builder.is_valid());
}

#[test]
fn in_place_failures_keep_the_builder_usable() {
    let context = Context::new().unwrap();
    let mut builder = Builder::from_json(&context, r#"{"title": "t"}"#).unwrap();

    assert!(builder.add_action("not json").is_err());
    assert!(builder.add_action(r#"{"no_action_field": 1}"#).is_err());
    assert!(builder.is_valid());
    builder.add_action(r#"{"action": "c2pa.edited"}"#).unwrap();
}

#[test]
fn concurrent_failures_each_get_their_own_category() {
    let workers: Vec<_> = (0..8)
        .map(|i| {
            std::thread::spawn(move || {
                let context = Context::new().unwrap();
                if i % 2 == 0 {
                    let mut builder = Builder::new(&context).unwrap();
                    let err = builder.add_action("not json").unwrap_err();
                    assert!(matches!(err, Error::InvalidArgument(_)));
                } else {
                    let mut unsigned = Cursor::new(b"plain asset".to_vec());
                    let err = Reader::new(&context, "png", &mut unsigned).unwrap_err();
                    assert!(matches!(err, Error::Engine { .. }));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
}
