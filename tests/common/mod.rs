#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use smoothie_net::command::{BuiltinCommands, CommandExecutor, queue};
use smoothie_net::config::HttpConfig;
use smoothie_net::output::SinkCollector;
use smoothie_net::server::{self, Services};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
pub const SAMPLE_ACCEPT: &str = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";

pub fn services() -> Services {
    let (queue, rx) = queue::channel(8);
    // detached; exits once every queue handle is gone
    CommandExecutor::spawn(BuiltinCommands, rx).unwrap();
    Services {
        queue,
        collector: Arc::new(SinkCollector::new()),
    }
}

pub async fn start_http(root: &Path, upload_dir: &Path) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cfg = HttpConfig {
        root_dir: root.to_path_buf(),
        upload_dir: upload_dir.to_path_buf(),
        ..HttpConfig::default()
    };
    tokio::spawn(server::listener::serve(listener, cfg, services()));
    addr
}

pub async fn start_shell(max_connections: usize) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::shell::serve(listener, max_connections, services()));
    addr
}

/// Reads one response: the head as text and a body of `Content-Length`
/// bytes.
pub async fn read_response(stream: &mut TcpStream) -> (String, Vec<u8>) {
    let mut head = Vec::new();
    while !head.ends_with(b"\r\n\r\n") {
        let mut byte = [0u8; 1];
        let n = stream.read(&mut byte).await.unwrap();
        assert_eq!(n, 1, "connection closed inside response head");
        head.push(byte[0]);
    }
    let head = String::from_utf8(head).unwrap();

    let length = header(&head, "Content-Length")
        .map(|v| v.parse::<usize>().unwrap())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    stream.read_exact(&mut body).await.unwrap();
    (head, body)
}

pub fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        k.eq_ignore_ascii_case(name).then(|| v.trim())
    })
}

pub fn upgrade_request(path: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: smoothie.local\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {SAMPLE_KEY}\r\n\
         Sec-WebSocket-Version: 13\r\n\r\n"
    )
}

/// Connects and completes the WebSocket handshake on `path`.
pub async fn open_websocket(addr: SocketAddr, path: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(upgrade_request(path).as_bytes())
        .await
        .unwrap();
    let (head, _) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 101 "), "{head}");
    stream
}

/// A masked client frame with FIN set.
pub fn client_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mask = [0x11, 0x22, 0x33, 0x44];
    let mut frame = vec![0x80 | opcode];
    if payload.len() < 126 {
        frame.push(0x80 | payload.len() as u8);
    } else {
        frame.push(0x80 | 126);
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    }
    frame.extend_from_slice(&mask);
    frame.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
    frame
}

/// Reads one unmasked server frame, returning its opcode and payload.
pub async fn read_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await.unwrap();
    assert_eq!(header[1] & 0x80, 0, "server frames are not masked");

    let length = match header[1] & 0x7F {
        126 => {
            let mut ext = [0u8; 2];
            stream.read_exact(&mut ext).await.unwrap();
            u16::from_be_bytes(ext) as usize
        }
        len => len as usize,
    };

    let mut payload = vec![0u8; length];
    stream.read_exact(&mut payload).await.unwrap();
    (header[0] & 0x0F, payload)
}

/// Reads text frames until their concatenation ends with `suffix`.
pub async fn read_text_until(stream: &mut TcpStream, suffix: &str) -> String {
    let mut text = String::new();
    while !text.ends_with(suffix) {
        let (opcode, payload) = read_frame(stream).await;
        assert_eq!(opcode, 0x1, "expected a text frame");
        text.push_str(std::str::from_utf8(&payload).unwrap());
    }
    text
}

/// Reads raw bytes until they end with `suffix`.
pub async fn read_until(stream: &mut TcpStream, suffix: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    let mut buf = [0u8; 256];
    while !data.ends_with(suffix) {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "connection closed before {:?}", String::from_utf8_lossy(suffix));
        data.extend_from_slice(&buf[..n]);
    }
    data
}
