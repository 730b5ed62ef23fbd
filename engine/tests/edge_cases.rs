//! Edge case tests for proofstore-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use proofstore_engine::{
    Error, ParamType, ResourceParams, SearchParamDef, StaticCatalog, Store, StoreConfig,
    VersionClock,
};
use serde_json::json;

fn basic_catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_universal(SearchParamDef::universal("_id", ParamType::Token))
        .with_resource(ResourceParams::new(
            "Basic",
            vec![
                SearchParamDef::new("text", ParamType::String, "Basic.text"),
                SearchParamDef::new("code", ParamType::Token, "Basic.code"),
                SearchParamDef::new("score", ParamType::Number, "Basic.score"),
                SearchParamDef::new("deep", ParamType::String, "Basic.a.b.c.d.e"),
            ],
        ))
}

fn test_store() -> Store {
    Store::default().with_catalog(basic_catalog())
}

// ============================================================================
// String Edge Cases
// ============================================================================

#[test]
fn empty_string_fields() {
    let mut store = test_store();
    let id = store
        .create("Basic", &json!({"resourceType": "Basic", "text": ""}))
        .unwrap();

    let record = store.read("Basic", &id).unwrap();
    assert_eq!(record.content["text"], "");

    // an empty term cannot be written in a query
    let result = store.search("Basic", "text=");
    assert!(matches!(result, Err(Error::InvalidQuery(_))));
}

#[test]
fn unicode_strings() {
    let mut store = test_store();

    let texts = vec![
        "日本語テスト",
        "Привет мир",
        "مرحبا بالعالم",
        "🎉🚀💯",
        "Ω≈ç√∫",
        "Hello\nWorld\tTab",
    ];

    for text in &texts {
        store
            .create("Basic", &json!({"resourceType": "Basic", "text": text}))
            .unwrap();
    }

    for text in &texts {
        let bundle = store.search("Basic", &format!("text={}", text)).unwrap();
        assert_eq!(bundle.total, 1, "Failed for: {}", text);
        assert_eq!(bundle.entries[0].content["text"], *text);
    }
}

#[test]
fn unicode_case_folding() {
    let mut store = test_store();
    store
        .create("Basic", &json!({"resourceType": "Basic", "text": "ÄRZTIN"}))
        .unwrap();

    assert_eq!(store.search("Basic", "text=ärztin").unwrap().total, 1);
}

#[test]
fn very_long_strings() {
    let mut store = test_store();
    let long = "x".repeat(100_000);
    let id = store
        .create("Basic", &json!({"resourceType": "Basic", "text": long}))
        .unwrap();

    let bundle = store.search("Basic", &format!("text={}", long)).unwrap();
    assert_eq!(bundle.ids(), vec![id.as_str()]);
}

// ============================================================================
// Numeric Edge Cases
// ============================================================================

#[test]
fn numbers_compare_as_text() {
    let mut store = test_store();
    let nine = store
        .create("Basic", &json!({"resourceType": "Basic", "score": 9}))
        .unwrap();
    store
        .create("Basic", &json!({"resourceType": "Basic", "score": 10}))
        .unwrap();

    // "10" sorts before "9"
    assert_eq!(store.search("Basic", "score=gt10").unwrap().ids(), vec![nine.as_str()]);
    assert_eq!(store.search("Basic", "score=10").unwrap().total, 1);
}

#[test]
fn clock_counter_high_values() {
    let mut clock = VersionClock::with_counter(u64::MAX - 1);
    assert_eq!(clock.tick().unwrap().version_id, u64::MAX.to_string());
    assert_eq!(clock.tick(), Err(Error::VersionsExhausted));
}

// ============================================================================
// JSON Edge Cases
// ============================================================================

#[test]
fn deeply_nested_paths() {
    let mut store = test_store();
    let id = store
        .create(
            "Basic",
            &json!({"resourceType": "Basic", "a": {"b": [{"c": {"d": [{"e": "found"}, {"e": "also"}]}}]}}),
        )
        .unwrap();
    store
        .create("Basic", &json!({"resourceType": "Basic", "a": {"b": null}}))
        .unwrap();

    assert_eq!(store.search("Basic", "deep=also").unwrap().ids(), vec![id.as_str()]);
}

#[test]
fn stamping_keeps_other_meta_fields() {
    let mut store = test_store();
    let id = store
        .create(
            "Basic",
            &json!({"resourceType": "Basic", "meta": {"versionId": "bogus", "tag": [{"code": "t"}]}}),
        )
        .unwrap();

    let record = store.read("Basic", &id).unwrap();
    assert_eq!(record.content["meta"]["versionId"], json!(record.version_id));
    assert_eq!(record.content["meta"]["tag"][0]["code"], "t");
}

#[test]
fn non_object_meta_is_replaced() {
    let mut store = test_store();
    let id = store
        .create("Basic", &json!({"resourceType": "Basic", "meta": "junk"}))
        .unwrap();

    let record = store.read("Basic", &id).unwrap();
    assert!(record.content["meta"].is_object());
}

// ============================================================================
// Isolation
// ============================================================================

#[test]
fn caller_mutation_after_create() {
    let mut store = test_store();
    let mut body = json!({"resourceType": "Basic", "text": "before"});
    let id = store.create("Basic", &body).unwrap();

    body["text"] = json!("after");
    assert_eq!(store.read("Basic", &id).unwrap().content["text"], "before");
}

#[test]
fn caller_mutation_after_update() {
    let mut store = test_store();
    let id = store
        .create("Basic", &json!({"resourceType": "Basic"}))
        .unwrap();

    let mut body = json!({"resourceType": "Basic", "text": "v2"});
    let mut returned = store.update("Basic", &id, &body).unwrap();
    body["text"] = json!("caller");
    returned.content["text"] = json!("returned");

    assert_eq!(store.read("Basic", &id).unwrap().content["text"], "v2");
}

// ============================================================================
// Catalog Edge Cases
// ============================================================================

#[test]
fn custom_catalog_hides_r4_params() {
    let mut store = test_store();
    let result = store.search("Patient", "name=Doe");
    assert_eq!(result, Err(Error::UnknownParameter("name".into())));
}

#[test]
fn id_search_uses_identity_field() {
    let mut store = test_store();
    let id = store
        .create("Basic", &json!({"resourceType": "Basic"}))
        .unwrap();
    store
        .create("Basic", &json!({"resourceType": "Basic"}))
        .unwrap();

    let other = "not-the-id";
    let query = format!("_id={},{}", other, id);
    assert_eq!(store.search("Basic", &query).unwrap().ids(), vec![id.as_str()]);
}

// ============================================================================
// Config Edge Cases
// ============================================================================

#[test]
fn base_url_is_normalized() {
    let config = StoreConfig::new("  https://example.org/r4  ").unwrap();
    assert_eq!(config.base_url, "https://example.org/r4/");
    assert_eq!(config.location("Basic", "b-1"), "https://example.org/r4/Basic/b-1");
}

// ============================================================================
// Scale
// ============================================================================

#[test]
fn many_records() {
    let mut store = test_store();
    for i in 0..500 {
        let code = if i % 5 == 0 { "five" } else { "other" };
        store
            .create("Basic", &json!({"resourceType": "Basic", "code": {"code": code}}))
            .unwrap();
    }

    assert_eq!(store.count("Basic"), 500);
    assert_eq!(store.search("Basic", "code=five").unwrap().total, 100);
}
