//! Live reload: push change notifications to connected browsers.
//!
//! Browsers load [`CLIENT_SCRIPT`], which opens an `EventSource` on
//! `/__livereload`. Each connection subscribes a channel here; a stylesheet
//! change swaps the matching `<link>` tags in place, anything else reloads
//! the page.

use serde_json::json;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Event stream endpoint.
pub const EVENTS_PATH: &str = "/__livereload";
/// Client script endpoint.
pub const SCRIPT_PATH: &str = "/__livereload.js";

/// Browser side of the live-reload protocol.
pub const CLIENT_SCRIPT: &str = r#"(function () {
  var source = new EventSource('/__livereload');
  source.onmessage = function (event) {
    var message = JSON.parse(event.data);
    if (message.command !== 'css') {
      window.location.reload();
      return;
    }
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    links.forEach(function (link) {
      var url = new URL(link.href, window.location.href);
      var name = url.pathname.split('/').pop();
      if (message.files.indexOf(name) === -1) return;
      url.searchParams.set('livereload', Date.now());
      link.href = url.toString();
    });
  };
})();
"#;

/// Connected browsers.
#[derive(Debug, Clone, Default)]
pub struct LiveReload {
    clients: Arc<Mutex<Vec<Sender<String>>>>,
}

impl LiveReload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a browser; messages arrive as JSON strings.
    pub fn subscribe(&self) -> Receiver<String> {
        let (tx, rx) = channel();
        if let Ok(mut clients) = self.clients.lock() {
            clients.push(tx);
        }
        rx
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Send to every browser, dropping the ones that went away.
    fn broadcast(&self, message: String) {
        if let Ok(mut clients) = self.clients.lock() {
            clients.retain(|client| client.send(message.clone()).is_ok());
            tracing::debug!(clients = clients.len(), "live reload: {}", message);
        }
    }

    /// Reload every page.
    pub fn reload(&self) {
        self.broadcast(json!({ "command": "reload" }).to_string());
    }

    /// Refresh the named stylesheets without a page reload.
    pub fn notify_css(&self, files: &[String]) {
        if files.is_empty() {
            return;
        }
        self.broadcast(json!({ "command": "css", "files": files }).to_string());
    }
}

/// Insert the client script tag before the last `</body>`, or append it when
/// the document has none.
pub fn inject_script(html: &str) -> String {
    let tag = format!("<script src=\"{}\"></script>", SCRIPT_PATH);
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(index) => format!("{}{}\n{}", &html[..index], tag, &html[index..]),
        None => format!("{}{}\n", html, tag),
    }
}
