//! Decoding of the realtime database `text/event-stream` protocol into full-value snapshots.

use serde::Deserialize;
use serde_json::Value;

use crate::dao::remote_store::tree;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct RawEvent {
    pub event: String,
    pub data: String,
}

/// Incremental line decoder; chunks may split lines (and UTF-8 sequences) anywhere.
#[derive(Debug, Default)]
pub(super) struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RawEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(position) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=position).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(event) = self.event.take() {
                    events.push(RawEvent {
                        event,
                        data: self.data.join("\n"),
                    });
                }
                self.data.clear();
                continue;
            }

            if let Some(value) = line.strip_prefix("event:") {
                self.event = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.trim_start().to_string());
            }
        }

        events
    }
}

#[derive(Debug, Deserialize)]
struct PathPayload {
    path: String,
    data: Value,
}

/// What the subscriber should see after an event.
#[derive(Debug, PartialEq)]
pub(super) enum StreamOutcome {
    /// Full value of the subscribed path after the event.
    Value(Option<Value>),
    /// Keep-alive or an event that left the value unchanged.
    Idle,
    /// Rules now reject the listener (`cancel` / `auth_revoked`).
    Revoked,
}

/// Local mirror of the subscribed path, rebuilt from `put`/`patch` events.
#[derive(Debug, Default)]
pub(super) struct StreamState {
    cache: Value,
    primed: bool,
}

impl StreamState {
    pub fn apply(&mut self, event: RawEvent) -> Result<StreamOutcome, String> {
        match event.event.as_str() {
            "keep-alive" => Ok(StreamOutcome::Idle),
            "cancel" | "auth_revoked" => Ok(StreamOutcome::Revoked),
            "put" | "patch" => {
                let payload: PathPayload = serde_json::from_str(&event.data)
                    .map_err(|err| format!("invalid {} payload: {err}", event.event))?;
                let before = self.cache.clone();

                if event.event == "put" {
                    tree::set(&mut self.cache, &payload.path, payload.data);
                } else {
                    let Value::Object(patch) = payload.data else {
                        return Err("patch payload is not an object".into());
                    };
                    tree::merge(&mut self.cache, &payload.path, patch);
                }

                if self.primed && before == self.cache {
                    return Ok(StreamOutcome::Idle);
                }
                self.primed = true;
                Ok(StreamOutcome::Value(tree::get(&self.cache, "").cloned()))
            }
            other => Err(format!("unknown event `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn event(name: &str, data: Value) -> RawEvent {
        RawEvent {
            event: name.into(),
            data: data.to_string(),
        }
    }

    #[test]
    fn decoder_reassembles_split_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"event: put\ndata: {\"path\":\"/\",").is_empty());
        let events = decoder.push(b"\"data\":null}\n\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "put");
        assert_eq!(events[0].data, r#"{"path":"/","data":null}"#);
        assert_eq!(events[1].event, "keep-alive");
    }

    #[test]
    fn initial_null_put_is_delivered_as_absent() {
        let mut state = StreamState::default();
        let outcome = state
            .apply(event("put", json!({"path": "/", "data": null})))
            .unwrap();
        assert_eq!(outcome, StreamOutcome::Value(None));
    }

    #[test]
    fn put_and_patch_rebuild_full_values() {
        let mut state = StreamState::default();
        state
            .apply(event("put", json!({"path": "/", "data": {"a": 1}})))
            .unwrap();
        let outcome = state
            .apply(event("patch", json!({"path": "/", "data": {"b/c": 2, "a": null}})))
            .unwrap();
        assert_eq!(outcome, StreamOutcome::Value(Some(json!({"b": {"c": 2}}))));

        let outcome = state
            .apply(event("put", json!({"path": "/b/c", "data": 2})))
            .unwrap();
        assert_eq!(outcome, StreamOutcome::Idle);
    }

    #[test]
    fn cancel_revokes_the_listener() {
        let mut state = StreamState::default();
        let outcome = state.apply(event("cancel", Value::Null)).unwrap();
        assert_eq!(outcome, StreamOutcome::Revoked);
        assert!(state.apply(event("bogus", Value::Null)).is_err());
    }
}
