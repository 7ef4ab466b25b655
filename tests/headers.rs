use stream_http::headers;

#[test]
fn canonicalises_casing() {
    assert_eq!(headers::normalise("content-length"), "Content-Length");
    assert_eq!(headers::normalise("Content-Length"), "Content-Length");
    assert_eq!(headers::normalise("CONTENT-length"), "Content-Length");
    assert_eq!(headers::normalise("x-custom-header"), "X-Custom-Header");
}

#[test]
fn normalise_is_idempotent() {
    for name in &["host", "X-Forwarded-For", "ETAG", "a-b-c-d", "CONTENT-type"] {
        let once = headers::normalise(name);
        let twice = headers::normalise(&once);
        assert_eq!(once, twice);
    }
}

#[test]
fn duplicate_values_fold_without_space() {
    let mut map = headers::HeaderMap::new();
    map.insert_or_fold("H", "v1");
    map.insert_or_fold("h", "v2");
    assert_eq!(map.get("H"), Some("v1,v2"));
}
