//! Development server.
//!
//! Serves the site's files over HTTP with live reload, then watches the
//! sources. Style tasks push refreshed stylesheets to connected browsers and
//! a change to the entry document reloads them.

pub mod livereload;

pub use livereload::{inject_script, LiveReload, CLIENT_SCRIPT, EVENTS_PATH, SCRIPT_PATH};

use crate::build::parallel::TaskRunner;
use crate::build::progress::ProgressEvent;
use crate::error::TaskError;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;

/// Interval of keep-alive comments on idle event streams.
const KEEPALIVE: Duration = Duration::from_secs(15);

/// A complete HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Response {
    fn new(status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self { status, content_type, body: body.into() }
    }

    fn text(status: u16, body: &str) -> Self {
        Self::new(status, "text/plain; charset=utf-8", body)
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            _ => "Internal Server Error",
        }
    }

    /// Status line, headers and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\
             Cache-Control: no-cache\r\nConnection: close\r\n\r\n",
            self.status,
            self.reason(),
            self.content_type,
            self.body.len()
        )
        .into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// Content type by file extension.
pub fn content_type(path: &Path) -> &'static str {
    let extension = path.extension().map(|e| e.to_string_lossy().to_lowercase());
    match extension.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json" | "map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Decode `%XX` escapes. Returns `None` for malformed escapes or non-UTF-8
/// results.
fn percent_decode(path: &str) -> Option<String> {
    let bytes = path.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = path.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

/// Map a request path onto a file below `root`. Paths escaping the root
/// are rejected; directories map to their `index.html`.
pub fn resolve_request(root: &Path, request_path: &str) -> Option<PathBuf> {
    let path = request_path.split(['?', '#']).next().unwrap_or("");
    let decoded = percent_decode(path)?;

    let mut resolved = root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if resolved.is_dir() {
        resolved.push("index.html");
    }
    Some(resolved)
}

/// Answer a `GET` for `request_path`.
pub fn respond(root: &Path, request_path: &str) -> Response {
    if request_path.split('?').next() == Some(SCRIPT_PATH) {
        return Response::new(200, content_type(Path::new("x.js")), CLIENT_SCRIPT);
    }

    let Some(file) = resolve_request(root, request_path) else {
        return Response::text(403, "Forbidden");
    };
    match fs::read(&file) {
        Ok(body) => {
            let kind = content_type(&file);
            if kind.starts_with("text/html") {
                let html = inject_script(&String::from_utf8_lossy(&body));
                Response::new(200, kind, html)
            } else {
                Response::new(200, kind, body)
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Response::text(404, "Not Found"),
        Err(e) => {
            tracing::warn!(file = %file.display(), "read failed: {}", e);
            Response::text(500, "Internal Server Error")
        }
    }
}

/// Read the request line, skipping the headers. Returns method and path.
fn read_request(stream: &TcpStream) -> std::io::Result<Option<(String, String)>> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let mut header = String::new();
    loop {
        header.clear();
        if reader.read_line(&mut header)? == 0 || header.trim().is_empty() {
            break;
        }
    }

    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(method), Some(path)) => Ok(Some((method.to_string(), path.to_string()))),
        _ => Ok(None),
    }
}

/// Hold an event stream open, forwarding live-reload messages.
fn stream_events(mut stream: TcpStream, livereload: &LiveReload) -> std::io::Result<()> {
    stream.write_all(
        b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\n\
          Cache-Control: no-cache\r\nConnection: keep-alive\r\n\r\n: connected\n\n",
    )?;
    let messages = livereload.subscribe();
    loop {
        match messages.recv_timeout(KEEPALIVE) {
            Ok(message) => write!(stream, "data: {}\n\n", message)?,
            // Writing to a closed connection ends the loop
            Err(RecvTimeoutError::Timeout) => stream.write_all(b": ping\n\n")?,
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
        stream.flush()?;
    }
}

fn handle_connection(
    mut stream: TcpStream,
    root: &Path,
    livereload: &LiveReload,
) -> std::io::Result<()> {
    let Some((method, path)) = read_request(&stream)? else {
        return stream.write_all(&Response::text(400, "Bad Request").to_bytes());
    };
    if method != "GET" && method != "HEAD" {
        return stream.write_all(&Response::text(405, "Method Not Allowed").to_bytes());
    }
    if path.split('?').next() == Some(EVENTS_PATH) {
        return stream_events(stream, livereload);
    }

    let response = respond(root, &path);
    tracing::debug!(status = response.status, "{} {}", method, path);
    let mut bytes = response.to_bytes();
    if method == "HEAD" {
        bytes.truncate(bytes.len() - response.body.len());
    }
    stream.write_all(&bytes)
}

/// Bind the server and answer requests on a background thread, one thread
/// per connection.
pub fn start_server(
    listener: TcpListener,
    root: PathBuf,
    livereload: LiveReload,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let root = root.clone();
                    let livereload = livereload.clone();
                    thread::spawn(move || {
                        if let Err(e) = handle_connection(stream, &root, &livereload) {
                            tracing::debug!("connection closed: {}", e);
                        }
                    });
                }
                Err(e) => tracing::warn!("accept failed: {}", e),
            }
        }
    })
}

/// Serve the site and watch its sources until the process is stopped.
pub fn serve(runner: &TaskRunner<'_>) -> Result<(), TaskError> {
    let context = runner.context();
    let config = &context.config().serve;
    let root = context.resolve_path(&config.base_dir);
    let address = format!("{}:{}", config.host, config.port);

    let listener = TcpListener::bind(&address)
        .map_err(|e| TaskError::Serve(format!("cannot listen on {}: {}", address, e)))?;
    let livereload = LiveReload::new();
    start_server(listener, root.clone(), livereload.clone());

    tracing::info!(root = %root.display(), "serving on http://{}", address);
    runner.reporter().report(ProgressEvent::Output {
        task: "serve".to_string(),
        text: format!("Serving {} at http://{}", root.display(), address),
    });

    let serving = runner.with_context(context.clone().with_livereload(livereload));
    crate::watch::watch(&serving)
}
