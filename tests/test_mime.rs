use smoothie_net::http::mime::{DEFAULT_CONTENT_TYPE, content_type};

#[test]
fn test_known_extensions() {
    assert_eq!(content_type("index.html"), "text/html");
    assert_eq!(content_type("a.b.css"), "text/css");
    assert_eq!(content_type("/js/app.js"), "text/javascript");
    assert_eq!(content_type("logo.PNG"), "image/png");
    assert_eq!(content_type("manual.pdf"), "application/pdf");
}

#[test]
fn test_unknown_or_missing_extension_defaults() {
    assert_eq!(content_type("noext"), DEFAULT_CONTENT_TYPE);
    assert_eq!(content_type("archive.tar.gz"), "text/html");
    assert_eq!(content_type("trailing."), "text/html");
}

#[test]
fn test_dot_in_directory_is_ignored() {
    assert_eq!(content_type("/v1.css/readme"), "text/html");
    assert_eq!(content_type("/v1.2/style.css"), "text/css");
}
