mod common;

use common::{header, read_response, start_http};
use std::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn site() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("index.html"), b"<html>smoothie</html>").unwrap();
    fs::create_dir(root.path().join("css")).unwrap();
    fs::write(root.path().join("css/site.css"), b"body { margin: 0 }").unwrap();
    root
}

#[tokio::test]
async fn test_get_root_serves_index() {
    let root = site();
    let addr = start_http(root.path(), root.path()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    let (head, body) = read_response(&mut stream).await;

    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(header(&head, "Content-Type"), Some("text/html"));
    assert_eq!(header(&head, "Connection"), Some("keep-alive"));
    assert_eq!(header(&head, "Content-Length"), Some("21"));
    assert_eq!(body, b"<html>smoothie</html>");
}

#[tokio::test]
async fn test_large_file_arrives_intact() {
    let root = site();
    let contents: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(root.path().join("firmware.bin"), &contents).unwrap();
    let addr = start_http(root.path(), root.path()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /firmware.bin HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;

    assert_eq!(header(&head, "Content-Length"), Some("100000"));
    assert_eq!(body, contents);
}

#[tokio::test]
async fn test_keep_alive_serves_sequential_requests() {
    let root = site();
    let addr = start_http(root.path(), root.path()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"GET /index.html HTTP/1.1\r\n\r\n").await.unwrap();
    let (_, first) = read_response(&mut stream).await;
    assert_eq!(first, b"<html>smoothie</html>");

    stream
        .write_all(b"GET /css/site.css?v=7 HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    let (head, second) = read_response(&mut stream).await;
    assert_eq!(header(&head, "Content-Type"), Some("text/css"));
    assert_eq!(second, b"body { margin: 0 }");
}

#[tokio::test]
async fn test_pipelined_requests_in_one_write() {
    let root = site();
    let addr = start_http(root.path(), root.path()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET /css/site.css HTTP/1.1\r\n\r\nGET /missing HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    let (first, _) = read_response(&mut stream).await;
    let (second, _) = read_response(&mut stream).await;
    assert!(first.starts_with("HTTP/1.1 200 "));
    assert!(second.starts_with("HTTP/1.1 404 "));
}

#[tokio::test]
async fn test_missing_file_is_404() {
    let root = site();
    let addr = start_http(root.path(), root.path()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"GET /nope.html HTTP/1.1\r\n\r\n").await.unwrap();
    let (head, body) = read_response(&mut stream).await;

    assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert_eq!(header(&head, "Content-Length"), Some("0"));
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_directory_and_traversal_are_404() {
    let outside = tempfile::tempdir().unwrap();
    let root = outside.path().join("www");
    fs::create_dir(&root).unwrap();
    fs::write(outside.path().join("secret.txt"), b"pin 1234").unwrap();
    fs::create_dir(root.join("sub")).unwrap();
    let addr = start_http(&root, &root).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"GET /../secret.txt HTTP/1.1\r\n\r\n").await.unwrap();
    let (head, _) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 404 "));

    stream.write_all(b"GET /sub HTTP/1.1\r\n\r\n").await.unwrap();
    let (head, _) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 404 "));
}

#[tokio::test]
async fn test_non_get_is_400() {
    let root = site();
    let addr = start_http(root.path(), root.path()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"POST /index.html HTTP/1.1\r\nContent-Length: 4\r\n\r\nG28\n")
        .await
        .unwrap();
    let (head, _) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 400 Bad Request\r\n"));

    // still usable afterwards
    stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    let (head, _) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200 "));
}

#[tokio::test]
async fn test_malformed_request_is_400_then_close() {
    let root = site();
    let addr = start_http(root.path(), root.path()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET / HTTP/1.1\r\nBroken Header\r\n\r\n")
        .await
        .unwrap();
    let (head, _) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 400 "));

    let mut buf = [0u8; 16];
    assert!(matches!(stream.read(&mut buf).await, Ok(0) | Err(_)));
}

#[tokio::test]
async fn test_command_endpoint_without_upgrade_is_400() {
    let root = site();
    let addr = start_http(root.path(), root.path()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"GET /command HTTP/1.1\r\n\r\n").await.unwrap();
    let (head, _) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 400 "));
}

#[tokio::test]
async fn test_connection_close_is_honoured() {
    let root = site();
    let addr = start_http(root.path(), root.path()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET /index.html HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200 "));
    assert_eq!(body, b"<html>smoothie</html>");

    let mut buf = [0u8; 16];
    assert!(matches!(stream.read(&mut buf).await, Ok(0) | Err(_)));
}

#[tokio::test]
async fn test_http10_without_keep_alive_closes() {
    let root = site();
    let addr = start_http(root.path(), root.path()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"GET /missing HTTP/1.0\r\n\r\n").await.unwrap();
    let (head, _) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 404 "));

    let mut buf = [0u8; 16];
    assert!(matches!(stream.read(&mut buf).await, Ok(0) | Err(_)));
}

#[tokio::test]
async fn test_oversized_content_length_is_400_then_close() {
    let root = site();
    let addr = start_http(root.path(), root.path()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"POST /x HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\n")
        .await
        .unwrap();
    let (head, _) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 400 "));

    let mut buf = [0u8; 16];
    assert!(matches!(stream.read(&mut buf).await, Ok(0) | Err(_)));
}
