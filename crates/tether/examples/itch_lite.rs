//! A single window that talks to Rust through `window.tether`.
//!
//! Run with: `cargo run --example itch_lite`

use tether::{BackendMessage, FrontendMessage, Handler, Options, Window};

struct App;

impl Drop for App {
    fn drop(&mut self) {
        tracing::info!("Window closed, exiting");
        if let Err(e) = tether::exit() {
            tracing::warn!("Could not exit: {}", e);
        }
    }
}

impl Handler for App {
    fn handle_message(&mut self, window: Window, message: &str) {
        tracing::info!("Received: {}", message);

        let Ok(msg) = FrontendMessage::parse(message) else {
            return;
        };
        let outcome = match msg.name.as_str() {
            "greet" => {
                let name = msg.payload["name"].as_str().unwrap_or("stranger");
                Ok(serde_json::json!(format!("Hello, {name}!")))
            }
            "fullscreen" => {
                let script = "document.documentElement.requestFullscreen()";
                window.eval(script).map(|()| serde_json::Value::Null).map_err(|e| e.to_string())
            }
            other => Err(format!("unknown request: {other}")),
        };

        if let Err(e) = window.reply(&msg, outcome) {
            tracing::error!("Failed to reply: {}", e);
        }
        if let Err(e) = window.send(&BackendMessage::event("handled", msg.payload)) {
            tracing::error!("Failed to notify page: {}", e);
        }
    }
}

const HTML: &str = r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <style>
        body {
            font-family: system-ui, sans-serif;
            margin: 0;
            padding: 20px;
            background: #2b2b2b;
            color: #eee;
        }
        button {
            background: #fa5c5c;
            color: white;
            border: none;
            padding: 10px 20px;
            border-radius: 4px;
            cursor: pointer;
        }
        #response { margin-top: 20px; font-family: monospace; }
    </style>
</head>
<body>
    <h1>itch lite</h1>
    <input id="name" placeholder="Your name">
    <button onclick="greet()">Greet</button>
    <button onclick="tether('plain string')">Raw message</button>
    <button onclick="tether.send('fullscreen')">Fullscreen</button>
    <div id="response"></div>
    <ul id="log"></ul>
    <script>
        tether.onMessage((name, payload) => {
            const item = document.createElement('li');
            item.textContent = name + ': ' + JSON.stringify(payload);
            document.getElementById('log').appendChild(item);
        });

        async function greet() {
            const name = document.getElementById('name').value;
            const reply = await tether.call('greet', { name });
            document.getElementById('response').textContent = reply;
        }
    </script>
</body>
</html>
"#;

fn main() -> tether::Result<()> {
    tracing_subscriber::fmt::init();

    tether::start(|| {
        let options = Options::new()
            .with_size(1280, 720)
            .with_debug(true)
            .with_handler(App);

        let window = match Window::new(options) {
            Ok(window) => window,
            Err(e) => {
                tracing::error!("Failed to open window: {}", e);
                return;
            }
        };
        if let Err(e) = window.title("itch lite").and_then(|()| window.load(HTML)) {
            tracing::error!("Failed to set up window: {}", e);
        }
    })
}
