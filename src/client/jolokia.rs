use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::broker::BrokerClient;
use super::error::{BrokerError, Result};
use super::models::{QueueMessage, QueueSummary};
use crate::config::ConnectionProfile;

/// Client for ActiveMQ's Jolokia management endpoint (JSON over HTTP, basic auth).
#[derive(Clone)]
pub struct JolokiaClient {
    endpoint: String,
    origin: String,
    broker_name: String,
    user: String,
    password: String,
    http: Client,
}

// ──────────────────────────── Jolokia JSON types ────────────────────────────
// Internal deserialization structs for the Jolokia response envelope and the
// MBean attribute / CompositeData shapes ActiveMQ returns.

#[derive(Debug, Deserialize)]
struct JolokiaResponse {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    value: Value,
    error: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct JolokiaQueueAttributes {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "QueueSize")]
    queue_size: Option<u64>,
    #[serde(rename = "ConsumerCount")]
    consumer_count: Option<u64>,
    #[serde(rename = "EnqueueCount")]
    enqueue_count: Option<u64>,
    #[serde(rename = "DequeueCount")]
    dequeue_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct JolokiaMessage {
    #[serde(rename = "JMSMessageID")]
    message_id: Option<String>,
    #[serde(rename = "JMSTimestamp")]
    timestamp: Option<Value>,
    #[serde(rename = "JMSPriority")]
    priority: Option<i32>,
    #[serde(rename = "JMSRedelivered")]
    redelivered: Option<bool>,
    #[serde(rename = "JMSType")]
    message_type: Option<String>,
    #[serde(rename = "Text")]
    text: Option<String>,
    #[serde(flatten)]
    rest: BTreeMap<String, Value>,
}

impl From<JolokiaMessage> for QueueMessage {
    fn from(m: JolokiaMessage) -> Self {
        QueueMessage {
            id: m.message_id.unwrap_or_default(),
            timestamp: m.timestamp.as_ref().map(value_text).unwrap_or_default(),
            priority: m.priority,
            redelivered: m.redelivered.unwrap_or(false),
            message_type: m.message_type.unwrap_or_default(),
            properties: m
                .rest
                .iter()
                .map(|(k, v)| (k.clone(), value_text(v)))
                .collect(),
            body: m.text.unwrap_or_default(),
        }
    }
}

impl JolokiaClient {
    pub fn new(profile: &ConnectionProfile, timeout: Duration) -> Result<Self> {
        let scheme = if profile.use_tls { "https" } else { "http" };
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint_url(scheme, &profile.host, profile.port, &profile.context_path),
            origin: format!("{}://{}", scheme, profile.host),
            broker_name: profile.broker_name.clone(),
            user: profile.user.clone(),
            password: profile.password.clone(),
            http,
        })
    }

    fn queue_mbean(&self, destination: &str) -> String {
        queue_mbean(&self.broker_name, destination)
    }

    /// POST one Jolokia request and decode the response envelope.
    async fn execute(&self, payload: Value) -> Result<JolokiaResponse> {
        let resp = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.user, Some(&self.password))
            .header("Origin", &self.origin)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status >= 400 {
            let body = resp.text().await?;
            return Err(BrokerError::Api { status, body });
        }

        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            let preview: String = text.chars().take(1000).collect();
            warn!("Failed to decode Jolokia response: {}. Content: {}", e, preview);
            BrokerError::Json(e)
        })
    }

    /// Run an `exec` operation whose result is a boolean success flag.
    async fn exec_flag(&self, mbean: String, operation: &str, arguments: Value) -> Result<bool> {
        debug!("exec {} on {}", operation, mbean);
        let payload = json!({
            "type": "exec",
            "mbean": mbean,
            "operation": operation,
            "arguments": arguments,
        });
        let resp = self.execute(payload).await?;
        if resp.status != 200 {
            warn!(
                "Jolokia {} returned status {}: {}",
                operation,
                resp.status,
                resp.error.as_deref().unwrap_or("-")
            );
        }
        Ok(action_succeeded(&resp))
    }
}

#[async_trait]
impl BrokerClient for JolokiaClient {
    fn describe(&self) -> String {
        self.endpoint.clone()
    }

    async fn list_queues(&self) -> Result<Vec<QueueSummary>> {
        let payload = json!({
            "type": "read",
            "mbean": self.queue_mbean("*"),
        });
        let resp = self.execute(payload).await?;
        parse_queue_listing(into_value(resp)?)
    }

    async fn browse_messages(&self, queue: &str) -> Result<Vec<QueueMessage>> {
        let payload = json!({
            "type": "exec",
            "mbean": self.queue_mbean(queue),
            "operation": "browse()",
        });
        let resp = self.execute(payload).await?;
        parse_messages(into_value(resp)?)
    }

    async fn move_message(&self, message_id: &str, source: &str, target: &str) -> Result<bool> {
        self.exec_flag(
            self.queue_mbean(source),
            "moveMessageTo(java.lang.String,java.lang.String)",
            json!([message_id, target]),
        )
        .await
    }

    async fn delete_message(&self, message_id: &str, queue: &str) -> Result<bool> {
        self.exec_flag(
            self.queue_mbean(queue),
            "removeMessage(java.lang.String)",
            json!([message_id]),
        )
        .await
    }
}

// ──────────────────────────── Response parsing ────────────────────────────

fn endpoint_url(scheme: &str, host: &str, port: u16, context_path: &str) -> String {
    let path = context_path.trim();
    let path = if path.is_empty() {
        "/api/jolokia".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    format!("{}://{}:{}{}", scheme, host, port, path)
}

fn queue_mbean(broker_name: &str, destination: &str) -> String {
    format!(
        "org.apache.activemq:type=Broker,brokerName={},destinationType=Queue,destinationName={}",
        broker_name, destination
    )
}

fn into_value(resp: JolokiaResponse) -> Result<Value> {
    if resp.status != 200 {
        return Err(BrokerError::Jolokia {
            status: resp.status,
            error: resp.error.unwrap_or_default(),
        });
    }
    Ok(resp.value)
}

fn action_succeeded(resp: &JolokiaResponse) -> bool {
    resp.status == 200 && resp.value == Value::Bool(true)
}

/// Text form of a JSON scalar; objects and arrays keep their JSON encoding.
fn value_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `destinationName=...` from an MBean object name, used when `Name` is absent.
fn destination_from_mbean(mbean: &str) -> Option<&str> {
    let (_, props) = mbean.split_once(':')?;
    props
        .split(',')
        .find_map(|kv| kv.strip_prefix("destinationName="))
}

fn parse_queue_listing(value: Value) -> Result<Vec<QueueSummary>> {
    let entries = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => {
            return Err(BrokerError::InvalidResponse(format!(
                "expected a map of queue MBeans, got {}",
                other
            )))
        }
    };

    let mut queues = Vec::with_capacity(entries.len());
    for (mbean, attrs) in entries {
        let attrs: JolokiaQueueAttributes = serde_json::from_value(attrs)?;
        let name = match attrs.name.or_else(|| destination_from_mbean(&mbean).map(str::to_string)) {
            Some(n) => n,
            None => {
                warn!("Skipping queue MBean without a name: {}", mbean);
                continue;
            }
        };
        queues.push(QueueSummary {
            name,
            pending_count: attrs.queue_size.unwrap_or(0),
            consumer_count: attrs.consumer_count.unwrap_or(0),
            enqueued_count: attrs.enqueue_count.unwrap_or(0),
            dequeued_count: attrs.dequeue_count.unwrap_or(0),
        });
    }
    Ok(queues)
}

fn parse_messages(value: Value) -> Result<Vec<QueueMessage>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<JolokiaMessage>(item)
                    .map(QueueMessage::from)
                    .map_err(BrokerError::from)
            })
            .collect(),
        other => Err(BrokerError::InvalidResponse(format!(
            "expected a list of messages, got {}",
            other
        ))),
    }
}
