//! WebSocket-based live reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Messages sent to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Connection established.
    Connected,

    /// Full page reload.
    Reload,

    /// Swap in an updated stylesheet without reloading.
    InjectCss {
        /// Stylesheet path relative to the document root.
        path: String,
        /// New stylesheet contents.
        css: String,
    },
}

/// Hub broadcasting reload messages to every connected client.
///
/// Created by the caller and handed to both the server and the watch layer,
/// so separate orchestrators never share state. Sending with no connected
/// clients is a no-op.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    /// Create a new hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: ReloadMessage) {
        // Ignore send errors (no receivers)
        let _ = self.sender.send(msg);
    }

    /// Trigger a full page reload in every client.
    pub fn reload(&self) {
        self.send(ReloadMessage::Reload);
    }

    /// A sink that pushes updated stylesheets into live connections.
    pub fn stream(&self) -> CssSink {
        CssSink { hub: self.clone() }
    }

    /// Subscribe to reload messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Stylesheet-injection sink handed to the style rebuild.
#[derive(Debug, Clone)]
pub struct CssSink {
    hub: ReloadHub,
}

impl CssSink {
    /// Push one updated stylesheet to connected clients.
    pub fn push(&self, path: &str, css: &str) {
        self.hub.send(ReloadMessage::InjectCss {
            path: path.to_string(),
            css: css.to_string(),
        });
    }
}

/// Insert the live-reload client script into a rendered page.
pub fn inject_client(html: &str) -> String {
    let tag = "<script src=\"/__livereload.js\"></script>";

    if html.contains(tag) {
        return html.to_string();
    }

    match html.rfind("</body>") {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + tag.len() + 1);
            out.push_str(&html[..at]);
            out.push_str(tag);
            out.push('\n');
            out.push_str(&html[at..]);
            out
        }
        None => format!("{}{}\n", html, tag),
    }
}

/// Generate the client-side reload script.
///
/// The WebSocket URL is derived from the page's own host so the script works
/// on whatever address the server bound.
pub fn client_script(ws_path: &str) -> String {
    format!(
        r#"
(function() {{
  'use strict';

  const ws = new WebSocket('ws://' + location.host + '{}');
  let reconnectAttempts = 0;
  const maxReconnectAttempts = 10;

  ws.onopen = function() {{
    console.log('[livereload] Connected');
    reconnectAttempts = 0;
  }};

  ws.onmessage = function(event) {{
    const msg = JSON.parse(event.data);
    console.log('[livereload]', msg.type);

    switch (msg.type) {{
      case 'reload':
        location.reload();
        break;

      case 'inject_css':
        try {{
          const id = 'livereload-' + msg.path.replace(/[^a-z0-9]/gi, '-');
          let style = document.getElementById(id);
          if (!style) {{
            style = document.createElement('style');
            style.id = id;
            document.head.appendChild(style);
          }}
          style.textContent = msg.css;

          // The stale stylesheet must not win the cascade.
          document.querySelectorAll('link[rel="stylesheet"]').forEach(function(link) {{
            if (link.href.indexOf(msg.path) !== -1) {{
              link.disabled = true;
            }}
          }});
        }} catch (e) {{
          console.error('[livereload] Failed to inject styles:', e);
          location.reload();
        }}
        break;

      case 'connected':
        console.log('[livereload] Server acknowledged connection');
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[livereload] Disconnected');
    if (reconnectAttempts < maxReconnectAttempts) {{
      reconnectAttempts++;
      setTimeout(function() {{
        console.log('[livereload] Reconnecting...');
        location.reload();
      }}, 1000 * reconnectAttempts);
    }}
  }};

  ws.onerror = function(e) {{
    console.error('[livereload] WebSocket error:', e);
  }};
}})();
"#,
        ws_path
    )
}
