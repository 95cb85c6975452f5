use smoothie_net::http::response::{Response, ResponseBuilder, StatusCode};
use smoothie_net::http::writer::{ResponseWriter, serialize_response};

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::SwitchingProtocols.as_u16(), 101);
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    assert_eq!(StatusCode::NotFound.as_u16(), 404);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(
        StatusCode::SwitchingProtocols.reason_phrase(),
        "Switching Protocols"
    );
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::BadRequest.reason_phrase(), "Bad Request");
    assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
}

#[test]
fn test_response_builder_default_headers_first() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("X-Custom", "value")
        .body(b"Hello, World!".to_vec())
        .build();

    let names: Vec<&str> = response.headers.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        names,
        ["Content-Type", "Connection", "X-Custom", "Content-Length"]
    );
    assert_eq!(response.header("Content-Type"), Some("text/html"));
    assert_eq!(response.header("Connection"), Some("keep-alive"));
    assert_eq!(response.header("Content-Length"), Some("13"));
}

#[test]
fn test_response_builder_content_type_header_not_duplicated() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Type", "text/plain")
        .build();

    let count = response
        .headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("Content-Type"))
        .count();
    assert_eq!(count, 1);
    assert_eq!(response.header("content-type"), Some("text/plain"));
}

#[test]
fn test_response_builder_preserves_custom_content_length() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Length", "999")
        .body(b"test".to_vec())
        .build();

    // Should keep the custom value
    assert_eq!(response.header("Content-Length"), Some("999"));
}

#[test]
fn test_not_found_has_zero_length() {
    let response = Response::not_found();

    assert_eq!(response.status, StatusCode::NotFound);
    assert!(response.body.is_empty());
    assert_eq!(response.header("Content-Length"), Some("0"));
}

#[test]
fn test_file_head_carries_length_and_type() {
    let head = serialize_response(&Response::file("text/css", 1234));

    assert_eq!(
        head,
        b"HTTP/1.1 200 OK\r\n\
          Content-Type: text/css\r\n\
          Connection: keep-alive\r\n\
          Content-Length: 1234\r\n\
          \r\n"
            .to_vec()
    );
}

#[test]
fn test_switching_protocols_head() {
    let head = serialize_response(&Response::switching_protocols(
        "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=",
    ));
    let text = String::from_utf8(head).unwrap();

    assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
    assert!(text.contains("Upgrade: websocket\r\n"));
    assert!(text.contains("Connection: Upgrade\r\n"));
    assert!(text.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
    assert!(!text.contains("Content-Length"));
    assert!(text.ends_with("\r\n\r\n"));
}

#[tokio::test]
async fn test_response_writer_writes_everything() {
    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&Response::bad_request());

    writer.write_to_stream(&mut out).await.unwrap();

    assert_eq!(out, serialize_response(&Response::bad_request()));
    assert!(out.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));
}
