//! Serve a small site from memory by intercepting requests.
//!
//! Run with: `cargo run --example intercept`

use tether::{Handler, HandlerError, NetRequest, NetResponse, Options, Window};

const ORIGIN: &str = "https://app.local/";

const INDEX: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <link rel="stylesheet" href="style.css">
</head>
<body>
    <h1>Served from memory</h1>
    <p id="status">Loading script...</p>
    <script src="app.js"></script>
</body>
</html>
"#;

const STYLE: &str = "body { font-family: system-ui, sans-serif; background: #f4f4f4; }";

const SCRIPT: &str = r"
document.getElementById('status').textContent = 'Script loaded from ' + location.origin;
fetch('missing.json').then((res) => tether('missing.json: ' + res.status));
";

struct Assets;

impl Drop for Assets {
    fn drop(&mut self) {
        let _ = tether::exit();
    }
}

impl Handler for Assets {
    fn handle_message(&mut self, _window: Window, message: &str) {
        tracing::info!("Page says: {}", message);
    }

    fn handle_net(&mut self, request: NetRequest<'_>) -> Result<(), HandlerError> {
        let Some(path) = request.uri().strip_prefix(ORIGIN) else {
            return Ok(());
        };

        let content = match path {
            "" | "index.html" => INDEX,
            "style.css" => STYLE,
            "app.js" => SCRIPT,
            _ => {
                tracing::warn!("No asset for {}", path);
                request.respond(NetResponse::not_found());
                return Ok(());
            }
        };
        request.respond(NetResponse::ok(content.as_bytes()));
        Ok(())
    }
}

fn main() -> tether::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    tether::start(|| {
        let result = Window::new(Options::new().with_handler(Assets))
            .and_then(|window| window.navigate(ORIGIN));
        if let Err(e) = result {
            tracing::error!("Failed to open window: {}", e);
        }
    })
}
