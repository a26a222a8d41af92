/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Collaborator interfaces consumed by the subscribe loop.
//!
//! Implementations live outside this crate (see `subscribe-http` for the REST service).
//! A [`Transport::send`] future is cancelled by dropping it; implementations must release
//! the underlying connection when that happens.

use crate::event::Event;
use crate::state::cursor::Cursor;
use crate::state::subscription_set::ClientState;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Service call a request or status belongs to.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Operation {
    #[default]
    Subscribe,
    Unsubscribe,
    Heartbeat,
    Leave,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Subscribe => "subscribe",
            Operation::Unsubscribe => "unsubscribe",
            Operation::Heartbeat => "heartbeat",
            Operation::Leave => "leave",
        }
    }
}

/// Transport-neutral description of one service call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Request {
    pub operation: Operation,
    pub user_id: String,
    pub channels: Vec<String>,
    pub channel_groups: Vec<String>,
    /// Read position for subscribe calls; `None` asks the server to start at "now".
    pub cursor: Option<Cursor>,
    pub filter_expression: Option<String>,
    pub state: BTreeMap<String, ClientState>,
    /// Presence timeout announced to the server, in seconds.
    pub heartbeat: Option<u32>,
    /// For subscribe calls the server-side idle window; otherwise the client-side deadline.
    pub timeout: Duration,
}

/// Raw service reply.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Failure below the HTTP layer.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum TransportError {
    #[error("DNS lookup failed: {0}")]
    Dns(String),

    #[error("TLS handshake failed: {0}")]
    Tls(String),

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("request timed out")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Other(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}

/// Decoded long-poll reply: the next cursor and the events in server order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubscribeEnvelope {
    pub cursor: Cursor,
    pub events: Vec<Event>,
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("unable to decode subscribe response: {0}")]
pub struct DecodeError(pub String);

pub trait Decoder: Send + Sync {
    fn decode(&self, response: &Response) -> Result<SubscribeEnvelope, DecodeError>;
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("unable to decrypt payload: {0}")]
pub struct DecryptError(pub String);

/// Applied to message and signal payloads after decoding.
pub trait Cipher: Send + Sync {
    fn decrypt(&self, payload: &Value) -> Result<Value, DecryptError>;
}
