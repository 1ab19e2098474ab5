//! Application messages carried as frame payloads.

use bytes::Bytes;
use healthcheck::{EventKind, Status, StatusEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Format of `ServerPayload::timestamp`
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One target's check result as seen by observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerPayload {
    pub name: String,
    pub url: String,
    pub status: Status,

    /// Milliseconds, null when down
    pub response_time: Option<f64>,

    /// 0 when no HTTP response was received
    pub http_code: u16,

    pub error: Option<String>,
    pub timestamp: String,
    pub status_changed: bool,
}

impl From<&StatusEvent> for ServerPayload {
    fn from(event: &StatusEvent) -> Self {
        Self {
            name: event.target_name.clone(),
            url: event.url.clone(),
            status: event.new_status,
            response_time: event.detail.latency_ms,
            http_code: event.detail.http_status,
            error: event.detail.error.clone(),
            timestamp: event.detail.checked_at.format(TIMESTAMP_FORMAT).to_string(),
            status_changed: event.status_changed(),
        }
    }
}

/// Message from server to observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full state, sent once right after the upgrade
    InitialStatus { servers: BTreeMap<String, Status> },

    /// Result of every check
    ServerUpdate { server: ServerPayload },

    /// Target went down
    ServerAlert { message: String, server: ServerPayload },

    /// Target came back
    ServerRecovery { message: String, server: ServerPayload },
}

impl ServerMessage {
    /// Messages to broadcast for one event: always an update, plus an alert
    /// or recovery notice on transitions
    pub fn for_event(event: &StatusEvent) -> Vec<ServerMessage> {
        let server = ServerPayload::from(event);
        let mut messages = Vec::with_capacity(2);

        let extra = match event.kind {
            EventKind::AlertDown => Some(ServerMessage::ServerAlert {
                message: format!("CRITICAL: server '{}' is DOWN!", event.target_name),
                server: server.clone(),
            }),
            EventKind::AlertRecovered => Some(ServerMessage::ServerRecovery {
                message: format!("RECOVERED: server '{}' is back up!", event.target_name),
                server: server.clone(),
            }),
            EventKind::Update => None,
        };

        messages.push(ServerMessage::ServerUpdate { server });
        messages.extend(extra);
        messages
    }

    /// Serialize and wrap in a single text frame
    pub fn to_frame(&self) -> common::Result<Bytes> {
        let json = serde_json::to_vec(self)?;
        Ok(wsproto::encode(&json))
    }
}

/// Message from observer to server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ObserverCommand {
    /// Run a sweep now, regardless of the interval
    ForceCheck,
}

impl ObserverCommand {
    /// Parse a payload; anything unrecognized yields `None`
    pub fn parse(payload: &[u8]) -> Option<Self> {
        serde_json::from_slice(payload).ok()
    }
}
