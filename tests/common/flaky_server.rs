//! Minimal HTTP/1.1 server with a scripted status sequence for integration tests.
//!
//! Each incoming request consumes the next status from the script; once the
//! script is exhausted every request gets 200 with a small JSON body. Counts
//! requests so tests can assert attempt totals.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// Handle to a running scripted server.
pub struct FlakyServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
}

impl FlakyServer {
    /// Base URL of the server (e.g. "http://127.0.0.1:12345/").
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Number of requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Starts a server in a background thread that answers requests with the
/// statuses in `script`, in order, then 200 thereafter. The server runs
/// until the process exits.
pub fn start(script: Vec<u16>) -> FlakyServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let script: Arc<Mutex<VecDeque<u16>>> = Arc::new(Mutex::new(script.into_iter().collect()));
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_srv = Arc::clone(&hits);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let script = Arc::clone(&script);
            let hits = Arc::clone(&hits_srv);
            thread::spawn(move || handle(stream, &script, &hits));
        }
    });
    FlakyServer { base_url: format!("http://127.0.0.1:{}/", port), hits }
}

fn handle(
    mut stream: std::net::TcpStream,
    script: &Mutex<VecDeque<u16>>,
    hits: &AtomicUsize,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(_) => {}
    }
    hits.fetch_add(1, Ordering::SeqCst);
    let status = script.lock().unwrap().pop_front().unwrap_or(200);
    let (reason, body) = match status {
        200 => ("OK", r#"{"ok":true}"#),
        404 => ("Not Found", r#"{"error":"not found"}"#),
        429 => ("Too Many Requests", r#"{"error":"slow down"}"#),
        500 => ("Internal Server Error", r#"{"error":"boom"}"#),
        503 => ("Service Unavailable", r#"{"error":"overloaded"}"#),
        _ => ("Error", "{}"),
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}
