//! Structured messages on top of the `window.tether(string)` channel.
//!
//! Pages send `{name, payload, id?}` objects with `tether.send` and
//! `tether.call`. Rust answers with [`BackendMessage`]s, which the bridge
//! routes by their `kind`: events go to `tether.onMessage` listeners, replies
//! settle the promise returned by the matching `tether.call`.

use serde::{Deserialize, Serialize};

use crate::Result;

/// JavaScript bridge injected into every document before its own scripts run.
pub const JS_BRIDGE: &str = r#"
(function() {
    'use strict';

    const post = window.chrome.webview.postMessage.bind(window.chrome.webview);
    const listeners = [];
    const pending = new Map();
    let nextId = 0;

    const tether = function(s) {
        post(String(s));
    };

    tether.send = function(name, payload) {
        post(JSON.stringify({ name, payload }));
    };

    tether.call = function(name, payload) {
        const id = String(++nextId);
        return new Promise((resolve, reject) => {
            pending.set(id, { resolve, reject });
            post(JSON.stringify({ name, payload, id }));
        });
    };

    tether.onMessage = function(callback) {
        listeners.push(callback);
    };

    window.__tether_receive = function(msg) {
        if (msg.kind === 'event') {
            listeners.slice().forEach((callback) => callback(msg.name, msg.payload));
            return;
        }
        const call = pending.get(msg.id);
        if (!call) {
            return;
        }
        pending.delete(msg.id);
        if (msg.kind === 'reply') {
            call.resolve(msg.result);
        } else {
            call.reject(new Error(msg.error));
        }
    };

    Object.defineProperty(window, 'tether', { value: tether, writable: false, configurable: false });
})();
"#;

/// A structured message sent by the page with `tether.send` or `tether.call`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FrontendMessage {
    /// What the page is asking for.
    pub name: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Set by `tether.call`; the page awaits a reply carrying it.
    #[serde(default)]
    pub id: Option<String>,
}

impl FrontendMessage {
    /// Parse a string received through `tether.send` or `tether.call`.
    ///
    /// # Errors
    /// Returns an error if the string is not a JSON message object.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Whether the page is waiting for an answer.
    #[must_use]
    pub fn expects_reply(&self) -> bool {
        self.id.is_some()
    }

    /// The answer to this call, or `None` if it was sent with `tether.send`.
    #[must_use]
    pub fn reply(&self, outcome: std::result::Result<serde_json::Value, String>) -> Option<BackendMessage> {
        let id = self.id.clone()?;
        Some(match outcome {
            Ok(result) => BackendMessage::Reply { id, result },
            Err(error) => BackendMessage::Failure { id, error },
        })
    }
}

/// A structured message for the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendMessage {
    /// Delivered to every `tether.onMessage` listener.
    Event {
        name: String,
        payload: serde_json::Value,
    },
    /// Resolves the `tether.call` with the same id.
    Reply { id: String, result: serde_json::Value },
    /// Rejects the `tether.call` with the same id.
    Failure { id: String, error: String },
}

impl BackendMessage {
    /// An event for the page's listeners.
    #[must_use]
    pub fn event(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::Event {
            name: name.into(),
            payload,
        }
    }

    /// The script that hands this message to the bridge.
    ///
    /// # Errors
    /// Returns an error if the message could not be serialized.
    pub fn to_script(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("window.__tether_receive({json})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_send() {
        let msg = FrontendMessage::parse(r#"{"name":"ping","payload":{"value":42}}"#).unwrap();
        assert_eq!(msg.name, "ping");
        assert_eq!(msg.payload["value"], 42);
        assert!(!msg.expects_reply());
        assert_eq!(msg.reply(Ok(json!(1))), None);
    }

    #[test]
    fn test_parse_call_without_payload() {
        let msg = FrontendMessage::parse(r#"{"name":"quit","id":"7"}"#).unwrap();
        assert!(msg.payload.is_null());
        assert!(msg.expects_reply());
    }

    #[test]
    fn test_plain_strings_are_not_messages() {
        assert!(FrontendMessage::parse("hello there").is_err());
        assert!(FrontendMessage::parse(r#"{"payload":1}"#).is_err());
    }

    #[test]
    fn test_reply_carries_call_id() {
        let call = FrontendMessage::parse(r#"{"name":"greet","id":"3"}"#).unwrap();
        assert_eq!(
            call.reply(Ok(json!("hi"))),
            Some(BackendMessage::Reply {
                id: "3".to_string(),
                result: json!("hi"),
            })
        );
        assert_eq!(
            call.reply(Err("nope".to_string())),
            Some(BackendMessage::Failure {
                id: "3".to_string(),
                error: "nope".to_string(),
            })
        );
    }

    #[test]
    fn test_scripts_are_tagged_by_kind() {
        let event = BackendMessage::event("tick", json!({"n": 1})).to_script().unwrap();
        assert_eq!(
            event,
            r#"window.__tether_receive({"kind":"event","name":"tick","payload":{"n":1}})"#
        );

        let failure = BackendMessage::Failure {
            id: "9".to_string(),
            error: "boom".to_string(),
        };
        assert_eq!(
            failure.to_script().unwrap(),
            r#"window.__tether_receive({"kind":"failure","id":"9","error":"boom"})"#
        );
    }

    #[test]
    fn test_bridge_routes_by_kind() {
        assert!(JS_BRIDGE.contains("window.chrome.webview.postMessage"));
        assert!(JS_BRIDGE.contains("msg.kind === 'event'"));
        assert!(JS_BRIDGE.contains("msg.kind === 'reply'"));
        assert!(JS_BRIDGE.contains("Object.defineProperty(window, 'tether'"));
    }
}
