//! Verify URL construction and multipart encoding against JSON test vectors
//! stored in `test-vectors/`.
//!
//! Each vector file lists named cases with inputs and the exact expected
//! output, so the wire format is pinned independently of the unit tests.

use std::collections::BTreeMap;

use httpkit_core::builder::request_url;
use httpkit_core::{MultipartFormData, UrlError};
use url::Url;

fn text(case: &serde_json::Value, key: &str) -> String {
    case[key].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

#[test]
fn url_test_vectors() {
    let raw = include_str!("../../test-vectors/url.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = text(case, "name");
        let base = Url::parse(&text(case, "base")).unwrap();
        let parameters: BTreeMap<String, String> = serde_json::from_value(case["parameters"].clone()).unwrap();

        let result = request_url(&base, &text(case, "path"), &parameters);

        match case["expected_error"].as_str() {
            None => {
                let url = result.unwrap_or_else(|err| panic!("{name}: unexpected error {err}"));
                assert_eq!(url.as_str(), text(case, "expected_url"), "{name}: url");
            }
            Some("invalid_path") => {
                assert!(matches!(result, Err(UrlError::InvalidPath(_))), "{name}: {result:?}");
            }
            Some("cannot_be_a_base") => {
                assert!(matches!(result, Err(UrlError::CannotBeABase(_))), "{name}: {result:?}");
            }
            Some(other) => panic!("{name}: unknown expected error {other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Multipart encoding
// ---------------------------------------------------------------------------

#[test]
fn multipart_test_vectors() {
    let raw = include_str!("../../test-vectors/multipart.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = text(case, "name");
        let mut form = MultipartFormData::with_boundary(text(case, "boundary"));

        for part in case["parts"].as_array().unwrap() {
            form.add_data(
                text(part, "data"),
                part["name"].as_str().unwrap(),
                part["filename"].as_str(),
                part["mime_type"].as_str(),
            );
        }

        assert_eq!(
            form.content_type().as_str(),
            text(case, "expected_content_type"),
            "{name}: content type"
        );

        let encoded = form.encode().unwrap();
        assert_eq!(
            String::from_utf8(encoded).unwrap(),
            text(case, "expected_body"),
            "{name}: body"
        );
    }
}
