//! Minimal HTTP/1.1 server that streams chunked, newline-delimited bodies for
//! integration tests.
//!
//! Each accepted connection gets the next scripted [`Reply`]; connections
//! beyond the script get 404.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Reply {
    /// Status line with an empty body.
    Status(u16),
    /// 200 with one chunk per line, then a clean end of body.
    Lines(Vec<String>),
    /// 200 with one chunk per line, then the socket is closed mid-body.
    LinesThenAbort(Vec<String>),
}

impl Reply {
    pub fn lines(lines: &[&str]) -> Self {
        Reply::Lines(lines.iter().map(|s| s.to_string()).collect())
    }

    pub fn lines_then_abort(lines: &[&str]) -> Self {
        Reply::LinesThenAbort(lines.iter().map(|s| s.to_string()).collect())
    }
}

pub struct StreamServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StreamServer {
    /// Number of connections served so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Raw request heads, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Starts a server in a background thread. It runs until the process exits.
pub fn start(replies: Vec<Reply>) -> StreamServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let hits = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let replies = Arc::new(replies);
    {
        let hits = Arc::clone(&hits);
        let requests = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let n = hits.fetch_add(1, Ordering::SeqCst);
                let reply = replies.get(n).cloned().unwrap_or(Reply::Status(404));
                let requests = Arc::clone(&requests);
                thread::spawn(move || handle(stream, reply, &requests));
            }
        });
    }
    StreamServer {
        url: format!("http://127.0.0.1:{}/stream", port),
        hits,
        requests,
    }
}

/// A URL nothing listens on.
pub fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/stream", port)
}

fn handle(mut stream: TcpStream, reply: Reply, requests: &Mutex<Vec<String>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(head) = read_head(&mut stream) else {
        return;
    };
    requests.lock().unwrap().push(head);

    let lines = match reply {
        Reply::Status(code) => {
            let response = format!(
                "HTTP/1.1 {} Scripted\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                code
            );
            let _ = stream.write_all(response.as_bytes());
            return;
        }
        Reply::Lines(ref lines) | Reply::LinesThenAbort(ref lines) => lines,
    };
    let _ = stream.write_all(
        b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
    );
    for line in lines {
        let data = format!("{}\n", line);
        let chunk = format!("{:x}\r\n{}\r\n", data.len(), data);
        if stream.write_all(chunk.as_bytes()).is_err() {
            return;
        }
        let _ = stream.flush();
        thread::sleep(Duration::from_millis(5));
    }
    if matches!(reply, Reply::Lines(_)) {
        let _ = stream.write_all(b"0\r\n\r\n");
    }
    let _ = stream.flush();
    let _ = stream.shutdown(std::net::Shutdown::Both);
}

fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return None,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8(head).ok()
}
