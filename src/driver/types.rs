//! Driver message types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::browser::InterceptedRoute;

/// Request sent to the driver
#[derive(Debug, Clone, Serialize)]
pub struct RequestMessage<'a> {
    pub seq: i64,
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub command: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub arguments: Value,
}

impl<'a> RequestMessage<'a> {
    pub fn new(seq: i64, command: &'a str, arguments: Value) -> Self {
        Self {
            seq,
            message_type: "request",
            command,
            arguments,
        }
    }
}

/// Response to a request
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    pub request_seq: i64,
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub body: Option<Value>,
}

/// Unsolicited message from the driver
#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    pub event: String,
    #[serde(default)]
    pub body: Option<Value>,
}

/// Any message the driver sends
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DriverMessage {
    Response(ResponseMessage),
    Event(EventMessage),
}

/// Body of a `route` event: a call held by an active route
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEvent {
    pub route_id: String,
    pub page_id: String,
    pub url: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub body: String,
}

impl From<RouteEvent> for InterceptedRoute {
    fn from(event: RouteEvent) -> Self {
        Self {
            id: event.route_id,
            url: event.url,
            status: event.status,
            body: event.body,
        }
    }
}

/// Parsed driver events
#[derive(Debug, Clone)]
pub enum Event {
    Route(RouteEvent),
    /// The page or context was closed from the driver side
    Closed { page_id: Option<String> },
    Unknown { event: String, body: Option<Value> },
}

impl Event {
    pub fn from_message(msg: EventMessage) -> Self {
        match msg.event.as_str() {
            "route" => match msg
                .body
                .clone()
                .map(serde_json::from_value::<RouteEvent>)
            {
                Some(Ok(route)) => Event::Route(route),
                _ => Event::Unknown {
                    event: msg.event,
                    body: msg.body,
                },
            },
            "closed" => Event::Closed {
                page_id: msg
                    .body
                    .as_ref()
                    .and_then(|b| b.get("pageId"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            _ => Event::Unknown {
                event: msg.event,
                body: msg.body,
            },
        }
    }
}

/// Body of a `newContext` response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContextResponse {
    pub context_id: String,
    pub page_id: String,
}
