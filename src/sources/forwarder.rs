//! Event forwarding to the trigger-processing endpoint
//!
//! Every JSON line an event source prints becomes an [`EventEnvelope`] and is
//! handed to an [`EventSink`]. Delivery is attempted once; failures are
//! returned to the caller, which only logs them.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::config::ForwardingConfig;
use crate::error::{NodeworksError, Result};

/// Metadata block attached to every forwarded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub source: String,
    /// RFC 3339 capture time.
    pub timestamp: String,
    pub additional_data: Value,
}

/// The body POSTed to the trigger endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_type: String,
    pub source: String,
    pub data: Value,
    pub metadata: EventMetadata,
}

impl EventEnvelope {
    /// Normalize one emitted line.
    ///
    /// The type is read from `eventType`, `event_type` or `type` and defaults
    /// to `unknown`. The payload is the line's `data` field, or the whole line
    /// when there is none; `metadata` becomes `additional_data`.
    pub fn from_line(source_id: &str, line: Value) -> Self {
        let event_type = ["eventType", "event_type", "type"]
            .iter()
            .find_map(|key| line.get(*key).and_then(Value::as_str))
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("unknown")
            .to_string();

        let additional_data = line
            .get("metadata")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let data = line.get("data").cloned().unwrap_or(line);

        Self {
            event_type,
            source: source_id.to_string(),
            data,
            metadata: EventMetadata {
                source: source_id.to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                additional_data,
            },
        }
    }
}

/// What the collaborator reported for a delivered event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardReceipt {
    pub status: u16,
    /// Downstream matches, when the response names them.
    pub matched: Option<u64>,
}

/// Destination for captured events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Deliver one event.
    async fn forward(&self, event: &EventEnvelope) -> Result<ForwardReceipt>;
}

/// POSTs envelopes as JSON with reqwest.
pub struct HttpForwarder {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpForwarder {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EventSink for HttpForwarder {
    fn name(&self) -> &str {
        "http"
    }

    async fn forward(&self, event: &EventEnvelope) -> Result<ForwardReceipt> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await
            .map_err(|e| {
                NodeworksError::Transport(format!(
                    "POST {} for {} event from '{}' failed: {}",
                    self.endpoint, event.event_type, event.source, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NodeworksError::Transport(format!(
                "POST {} for {} event from '{}' returned {}: {}",
                self.endpoint,
                event.event_type,
                event.source,
                status,
                body.chars().take(500).collect::<String>()
            )));
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        Ok(ForwardReceipt {
            status: status.as_u16(),
            matched: matched_count(&body),
        })
    }
}

/// Sink used when forwarding is switched off.
pub struct DisabledSink;

#[async_trait]
impl EventSink for DisabledSink {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn forward(&self, event: &EventEnvelope) -> Result<ForwardReceipt> {
        debug!(
            source = %event.source,
            event_type = %event.event_type,
            "Forwarding disabled, dropping event"
        );
        Ok(ForwardReceipt::default())
    }
}

/// Build the sink described by configuration.
pub fn sink_from_config(config: &ForwardingConfig) -> Result<std::sync::Arc<dyn EventSink>> {
    if !config.enabled {
        return Ok(std::sync::Arc::new(DisabledSink));
    }
    Ok(std::sync::Arc::new(HttpForwarder::new(
        &config.endpoint,
        Duration::from_secs(config.timeout_secs.max(1)),
    )?))
}

/// Read the match count from `matched_count`, `matches` or `matched_triggers`.
fn matched_count(body: &Value) -> Option<u64> {
    body.get("matched_count")
        .and_then(Value::as_u64)
        .or_else(|| body.get("matches").and_then(Value::as_u64))
        .or_else(|| {
            body.get("matches")
                .or_else(|| body.get("matched_triggers"))
                .and_then(Value::as_array)
                .map(|a| a.len() as u64)
        })
}

/// Forward one event and log the outcome. Never fails.
pub async fn deliver(sink: &dyn EventSink, event: EventEnvelope) {
    match sink.forward(&event).await {
        Ok(receipt) => info!(
            source = %event.source,
            event_type = %event.event_type,
            sink = sink.name(),
            matched = receipt.matched.unwrap_or(0),
            "Event forwarded"
        ),
        Err(e) => error!(
            source = %event.source,
            event_type = %event.event_type,
            sink = sink.name(),
            error = %e,
            "Event forwarding failed"
        ),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Sink that keeps every envelope it receives.
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<EventEnvelope>>,
    }

    impl RecordingSink {
        pub fn count(&self) -> usize {
            self.events.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn forward(&self, event: &EventEnvelope) -> Result<ForwardReceipt> {
            self.events.lock().unwrap().push(event.clone());
            Ok(ForwardReceipt::default())
        }
    }
}
