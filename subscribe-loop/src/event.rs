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

//! Decoded subscribe events and status notifications delivered to listeners.

use crate::state::cursor::Timetoken;
use crate::state::dedup_cache::Fingerprint;
use crate::transport::{Cipher, DecryptError, Operation};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Attributes shared by every decoded event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventMeta {
    /// Channel the event was published on (presence suffix stripped).
    pub channel: String,
    /// Channel group or wildcard subscription that matched, when not the channel itself.
    pub subscription: Option<String>,
    pub timetoken: Timetoken,
    pub region: Option<u32>,
    /// Identity of the publisher, when the server reports one.
    pub publisher: Option<String>,
}

/// Message or signal payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageEvent {
    pub meta: EventMeta,
    /// Payload exactly as decoded from the response.
    pub payload: Value,
    /// Payload after decryption; `None` when no cipher is configured or decryption failed.
    pub decrypted: Option<Value>,
    pub user_metadata: Option<Value>,
    pub message_type: Option<String>,
}

impl MessageEvent {
    /// Decrypted payload when available, raw payload otherwise.
    pub fn content(&self) -> &Value {
        self.decrypted.as_ref().unwrap_or(&self.payload)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PresenceAction {
    Join,
    Leave,
    Timeout,
    StateChange,
    Interval,
}

impl PresenceAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "join" => Some(PresenceAction::Join),
            "leave" => Some(PresenceAction::Leave),
            "timeout" => Some(PresenceAction::Timeout),
            "state-change" => Some(PresenceAction::StateChange),
            "interval" => Some(PresenceAction::Interval),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PresenceEvent {
    pub meta: EventMeta,
    pub action: PresenceAction,
    /// Identity the event is about (absent for `interval` events).
    pub uuid: Option<String>,
    pub occupancy: u64,
    pub state: Option<Value>,
    /// Interval deltas; empty for single-identity events.
    pub join: Vec<String>,
    pub leave: Vec<String>,
    pub timeout: Vec<String>,
    pub payload: Value,
}

/// Entity kind touched by an object event.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ObjectEntity {
    Uuid,
    Channel,
    Membership,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ObjectEvent {
    pub meta: EventMeta,
    pub entity: ObjectEntity,
    /// Server action name, e.g. `set` or `delete`.
    pub action: String,
    pub data: Value,
    pub payload: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MessageActionEvent {
    pub meta: EventMeta,
    /// Server action name, e.g. `added` or `removed`.
    pub action: String,
    pub data: Value,
    pub payload: Value,
}

/// One entry of a long-poll response.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Message(MessageEvent),
    Signal(MessageEvent),
    Presence(PresenceEvent),
    Object(ObjectEvent),
    MessageAction(MessageActionEvent),
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EventKind {
    Message,
    Signal,
    Presence,
    Object,
    Membership,
    MessageAction,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Message => "message",
            EventKind::Signal => "signal",
            EventKind::Presence => "presence",
            EventKind::Object => "object",
            EventKind::Membership => "membership",
            EventKind::MessageAction => "message_action",
        }
    }
}

impl Event {
    pub fn meta(&self) -> &EventMeta {
        match self {
            Event::Message(event) | Event::Signal(event) => &event.meta,
            Event::Presence(event) => &event.meta,
            Event::Object(event) => &event.meta,
            Event::MessageAction(event) => &event.meta,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Message(_) => EventKind::Message,
            Event::Signal(_) => EventKind::Signal,
            Event::Presence(_) => EventKind::Presence,
            Event::Object(event) if event.entity == ObjectEntity::Membership => {
                EventKind::Membership
            }
            Event::Object(_) => EventKind::Object,
            Event::MessageAction(_) => EventKind::MessageAction,
        }
    }

    pub fn payload(&self) -> &Value {
        match self {
            Event::Message(event) | Event::Signal(event) => &event.payload,
            Event::Presence(event) => &event.payload,
            Event::Object(event) => &event.payload,
            Event::MessageAction(event) => &event.payload,
        }
    }

    /// Key used to recognise a redelivered event.
    pub fn fingerprint(&self) -> Fingerprint {
        let meta = self.meta();
        Fingerprint::new(&meta.channel, meta.timetoken, self.payload())
    }

    /// Decrypts message and signal payloads in place; other kinds are left untouched.
    pub(crate) fn decrypt_with(&mut self, cipher: &dyn Cipher) -> Result<(), DecryptError> {
        match self {
            Event::Message(event) | Event::Signal(event) => {
                event.decrypted = Some(cipher.decrypt(&event.payload)?);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Category of a [`Status`] notification.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum StatusCategory {
    Connected,
    Reconnected,
    Disconnected,
    UnexpectedDisconnect,
    AccessDenied,
    Timeout,
    NetworkIssues,
    MalformedFilterExpression,
    MessageCountExceeded,
    BadRequest,
    Cancelled,
    Acknowledgment,
    MalformedResponse,
    DecryptionError,
    RequestUriTooLong,
    #[default]
    Unknown,
}

impl StatusCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Connected => "connected",
            StatusCategory::Reconnected => "reconnected",
            StatusCategory::Disconnected => "disconnected",
            StatusCategory::UnexpectedDisconnect => "disconnected-unexpectedly",
            StatusCategory::AccessDenied => "access-denied",
            StatusCategory::Timeout => "timeout",
            StatusCategory::NetworkIssues => "network-issues",
            StatusCategory::MalformedFilterExpression => "malformed-filter-expression",
            StatusCategory::MessageCountExceeded => "message-count-exceeded",
            StatusCategory::BadRequest => "bad-request",
            StatusCategory::Cancelled => "cancelled",
            StatusCategory::Acknowledgment => "acknowledgment",
            StatusCategory::MalformedResponse => "malformed-response",
            StatusCategory::DecryptionError => "decryption-error",
            StatusCategory::RequestUriTooLong => "request-uri-too-long",
            StatusCategory::Unknown => "unknown",
        }
    }

    /// Whether the category reports a failure rather than a lifecycle transition.
    pub fn is_error(&self) -> bool {
        !matches!(
            self,
            StatusCategory::Connected
                | StatusCategory::Reconnected
                | StatusCategory::Disconnected
                | StatusCategory::Acknowledgment
                | StatusCategory::MessageCountExceeded
        )
    }
}

impl Display for StatusCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle or failure notification.
///
/// `terminal` statuses mean the loop has stopped advancing and will not resume until the
/// application subscribes (or reconnects) again.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Status {
    pub category: StatusCategory,
    pub operation: Operation,
    pub affected_channels: Vec<String>,
    pub affected_channel_groups: Vec<String>,
    pub subscribed_channels: Vec<String>,
    pub subscribed_channel_groups: Vec<String>,
    pub current_timetoken: Option<Timetoken>,
    pub last_timetoken: Option<Timetoken>,
    /// Consecutive failed attempts at the time of the status (zero on success).
    pub attempt: u32,
    pub is_error: bool,
    pub terminal: bool,
    pub message: Option<String>,
}

impl Status {
    pub fn new(category: StatusCategory, operation: Operation) -> Self {
        Self {
            category,
            operation,
            is_error: category.is_error(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Event, EventKind, EventMeta, MessageEvent, ObjectEntity, ObjectEvent};
    use super::{StatusCategory, Timetoken};
    use crate::transport::{Cipher, DecryptError};
    use serde_json::{json, Value};

    struct UppercaseCipher;

    impl Cipher for UppercaseCipher {
        fn decrypt(&self, payload: &Value) -> Result<Value, DecryptError> {
            payload
                .as_str()
                .map(|text| Value::String(text.to_uppercase()))
                .ok_or_else(|| DecryptError("payload is not a string".to_string()))
        }
    }

    fn message(channel: &str, timetoken: u64, payload: Value) -> Event {
        Event::Message(MessageEvent {
            meta: EventMeta {
                channel: channel.to_string(),
                timetoken: Timetoken(timetoken),
                ..Default::default()
            },
            payload,
            ..Default::default()
        })
    }

    #[test]
    fn fingerprint_distinguishes_channel_timetoken_and_payload() {
        let base = message("room1", 100, json!({"text": "hi"}));

        assert_eq!(
            base.fingerprint(),
            message("room1", 100, json!({"text": "hi"})).fingerprint()
        );
        assert_ne!(
            base.fingerprint(),
            message("room2", 100, json!({"text": "hi"})).fingerprint()
        );
        assert_ne!(
            base.fingerprint(),
            message("room1", 101, json!({"text": "hi"})).fingerprint()
        );
        assert_ne!(
            base.fingerprint(),
            message("room1", 100, json!({"text": "bye"})).fingerprint()
        );
    }

    #[test]
    fn membership_objects_report_membership_kind() {
        let event = Event::Object(ObjectEvent {
            meta: EventMeta::default(),
            entity: ObjectEntity::Membership,
            action: "set".to_string(),
            data: Value::Null,
            payload: Value::Null,
        });

        assert_eq!(event.kind(), EventKind::Membership);
    }

    #[test]
    fn decrypt_with_fills_decrypted_payload() {
        let mut event = message("room1", 1, json!("secret"));
        event
            .decrypt_with(&UppercaseCipher)
            .expect("string payload should decrypt");

        let Event::Message(message) = event else {
            panic!("expected message event");
        };
        assert_eq!(message.content(), &json!("SECRET"));
        assert_eq!(message.payload, json!("secret"));
    }

    #[test]
    fn decrypt_failure_keeps_raw_payload() {
        let mut event = message("room1", 1, json!({"not": "text"}));
        assert!(event.decrypt_with(&UppercaseCipher).is_err());

        let Event::Message(message) = event else {
            panic!("expected message event");
        };
        assert_eq!(message.decrypted, None);
        assert_eq!(message.content(), &json!({"not": "text"}));
    }

    #[test]
    fn lifecycle_categories_are_not_errors() {
        assert!(!StatusCategory::Connected.is_error());
        assert!(!StatusCategory::Reconnected.is_error());
        assert!(StatusCategory::AccessDenied.is_error());
        assert!(StatusCategory::NetworkIssues.is_error());
        assert_eq!(StatusCategory::UnexpectedDisconnect.as_str(), "disconnected-unexpectedly");
    }
}
