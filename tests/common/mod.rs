#![allow(dead_code)]

//! Stub camera HTTP server for integration tests: canned responses for the
//! vendor endpoints, with request recording and per-path failure injection.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Default)]
struct StubState {
    active_preset: u64,
    requests: Vec<String>,
    fail_prefixes: HashSet<String>,
    media_body: String,
    file_bytes: Vec<u8>,
}

pub struct StubCamera {
    pub port: u16,
    state: Arc<Mutex<StubState>>,
}

impl StubCamera {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(StubState {
            media_body: r#"{"media":[]}"#.to_string(),
            ..Default::default()
        }));

        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = handle(&mut socket, state).await;
                });
            }
        });

        Self { port, state }
    }

    pub fn set_media_body(&self, body: &str) {
        self.state.lock().unwrap().media_body = body.to_string();
    }

    pub fn set_file_bytes(&self, bytes: Vec<u8>) {
        self.state.lock().unwrap().file_bytes = bytes;
    }

    /// Make every request whose path starts with `prefix` return HTTP 500.
    pub fn fail_path(&self, prefix: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_prefixes
            .insert(prefix.to_string());
    }

    /// All request targets received so far, in order, including query strings.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }
}

async fn handle(socket: &mut TcpStream, state: Arc<Mutex<StubState>>) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    loop {
        let n = socket.read(&mut tmp).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&tmp[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let request = String::from_utf8_lossy(&buf);
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let path = target.split('?').next().unwrap_or("/").to_string();

    let (status, body): (u16, Vec<u8>) = {
        let mut st = state.lock().unwrap();
        st.requests.push(target.clone());

        if st.fail_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            (500, b"{}".to_vec())
        } else if path == "/gopro/camera/state" {
            let body = format!(r#"{{"status":{{"97":{}}},"settings":{{}}}}"#, st.active_preset);
            (200, body.into_bytes())
        } else if path == "/gopro/camera/presets/load" {
            if let Some(query) = target.split('?').nth(1) {
                for pair in query.split('&') {
                    if let Some(id) = pair.strip_prefix("id=") {
                        st.active_preset = id.parse().unwrap_or(0);
                    }
                }
            }
            (200, b"{}\n".to_vec())
        } else if path == "/gopro/camera/keep_alive" {
            // Empty 200, the generic success marker case.
            (200, Vec::new())
        } else if path == "/gopro/media/list" {
            (200, st.media_body.clone().into_bytes())
        } else if path.starts_with("/videos/DCIM/") {
            (200, st.file_bytes.clone())
        } else {
            (200, b"{}\n".to_vec())
        }
    };

    let reason = if status == 200 {
        "OK"
    } else {
        "Internal Server Error"
    };
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason,
        body.len()
    );
    socket.write_all(header.as_bytes()).await?;
    socket.write_all(&body).await?;
    socket.shutdown().await
}

/// A port with nothing listening on it.
pub async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
