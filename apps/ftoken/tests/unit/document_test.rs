//! Unit tests for document layout loading

use pretty_assertions::assert_eq;
use std::io::Write;

use ftoken::{Document, FtokenError};

const LAYOUT: &str = r#"{
    "forms": [
        {
            "id": "form_sign_in",
            "submit_controls": [{"name": "submit"}],
            "key_fields": [
                {"id": "email", "token_field_id": "ftoken_sign_in", "value": "user@example.com"}
            ],
            "token_fields": [
                {
                    "id": "ftoken_sign_in",
                    "form_id": "form_sign_in",
                    "url": "https://example.com/ftoken",
                    "wrap": "ftoken_sign_in_wrap"
                }
            ]
        }
    ]
}"#;

#[test]
fn test_load_layout_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(LAYOUT.as_bytes()).unwrap();

    let document = Document::from_json_file(file.path()).unwrap();

    let (form, key) = document.key_field("email").unwrap();
    assert_eq!(form.id, "form_sign_in");
    assert_eq!(key.value, "user@example.com");

    let token = document.token_field("ftoken_sign_in").unwrap();
    assert_eq!(token.wrap, "ftoken_sign_in_wrap");
    assert!(!token.has_token());
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Document::from_json_file(&dir.path().join("missing.json"));
    assert!(matches!(result, Err(FtokenError::Io(_))));
}

#[test]
fn test_malformed_layout_is_json_error() {
    let result = Document::from_json_str(r#"{"forms": [{"submit_controls": []}]}"#);
    assert!(matches!(result, Err(FtokenError::Json(_))));
}

#[test]
fn test_duplicate_field_ids_rejected() {
    let result = Document::from_json_str(
        r#"{"forms": [
            {"id": "a", "key_fields": [{"id": "x", "token_field_id": "t"}]},
            {"id": "b", "token_fields": [{"id": "x", "form_id": "b", "url": "https://e/f"}]}
        ]}"#,
    );
    assert!(matches!(result, Err(FtokenError::Layout(_))));
}
