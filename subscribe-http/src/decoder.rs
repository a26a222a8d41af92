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

//! Decoder for the v2 subscribe response body.
//!
//! A body looks like `{"t": {"t": "<timetoken>", "r": <region>}, "m": [<entry>, ...]}`. Each
//! entry carries its channel in `c`, the matched subscription in `b`, the payload in `d` and
//! its kind in `e` (absent or `0` message, `1` signal, `2` object, `3` message action, `4` file).
//! Entries on a `-pnpres` channel are presence events.

use serde::Deserialize;
use serde_json::Value;
use subscribe_loop::{
    is_presence_name, Cursor, DecodeError, Decoder, Event, EventMeta, MessageActionEvent,
    MessageEvent, ObjectEntity, ObjectEvent, PresenceAction, PresenceEvent, Response,
    SubscribeEnvelope, Timetoken, PRESENCE_SUFFIX,
};
use tracing::warn;

const COMPONENT: &str = "json_decoder";

const KIND_MESSAGE: u8 = 0;
const KIND_SIGNAL: u8 = 1;
const KIND_OBJECT: u8 = 2;
const KIND_MESSAGE_ACTION: u8 = 3;
const KIND_FILE: u8 = 4;

#[derive(Deserialize)]
struct WireEnvelope {
    t: WireCursor,
    #[serde(default)]
    m: Vec<WireEntry>,
}

#[derive(Deserialize)]
struct WireCursor {
    t: String,
    #[serde(default)]
    r: Option<u32>,
}

#[derive(Deserialize)]
struct WireEntry {
    c: String,
    #[serde(default)]
    b: Option<String>,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    e: Option<u8>,
    #[serde(default)]
    i: Option<String>,
    p: WireCursor,
    #[serde(default)]
    u: Option<Value>,
    #[serde(default)]
    cmt: Option<String>,
}

#[derive(Deserialize)]
struct WirePresence {
    action: String,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    occupancy: u64,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    join: Vec<String>,
    #[serde(default)]
    leave: Vec<String>,
    #[serde(default)]
    timeout: Vec<String>,
}

#[derive(Deserialize)]
struct WireObject {
    #[serde(rename = "type")]
    entity: String,
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct WireMessageAction {
    event: String,
    #[serde(default)]
    data: Value,
}

fn parse_cursor(cursor: &WireCursor) -> Result<Cursor, DecodeError> {
    let timetoken = cursor
        .t
        .parse::<Timetoken>()
        .map_err(|_| DecodeError(format!("invalid timetoken {:?}", cursor.t)))?;
    Ok(Cursor {
        timetoken,
        region: cursor.r,
    })
}

/// Stateless JSON decoder for subscribe responses.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDecoder;

impl JsonDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_entry(&self, entry: WireEntry) -> Result<Option<Event>, DecodeError> {
        let published = parse_cursor(&entry.p)?;
        let channel = entry
            .c
            .strip_suffix(PRESENCE_SUFFIX)
            .unwrap_or(&entry.c)
            .to_string();
        let subscription = entry.b.filter(|matched| matched != &entry.c);
        let meta = EventMeta {
            channel,
            subscription,
            timetoken: published.timetoken,
            region: published.region,
            publisher: entry.i,
        };

        if is_presence_name(&entry.c) {
            return self.decode_presence(meta, entry.d);
        }

        let event = match entry.e.unwrap_or(KIND_MESSAGE) {
            KIND_MESSAGE | KIND_FILE => Event::Message(MessageEvent {
                meta,
                payload: entry.d,
                decrypted: None,
                user_metadata: entry.u,
                message_type: entry.cmt,
            }),
            KIND_SIGNAL => Event::Signal(MessageEvent {
                meta,
                payload: entry.d,
                decrypted: None,
                user_metadata: entry.u,
                message_type: entry.cmt,
            }),
            KIND_OBJECT => {
                let object = WireObject::deserialize(&entry.d)
                    .map_err(|err| DecodeError(format!("object event on {}: {err}", meta.channel)))?;
                let entity = match object.entity.as_str() {
                    "uuid" => ObjectEntity::Uuid,
                    "channel" => ObjectEntity::Channel,
                    "membership" => ObjectEntity::Membership,
                    other => {
                        warn!(
                            component = COMPONENT,
                            channel = %meta.channel,
                            entity = other,
                            "skipping object event with unknown entity"
                        );
                        return Ok(None);
                    }
                };
                Event::Object(ObjectEvent {
                    meta,
                    entity,
                    action: object.event,
                    data: object.data,
                    payload: entry.d,
                })
            }
            KIND_MESSAGE_ACTION => {
                let action = WireMessageAction::deserialize(&entry.d).map_err(|err| {
                    DecodeError(format!("message action on {}: {err}", meta.channel))
                })?;
                Event::MessageAction(MessageActionEvent {
                    meta,
                    action: action.event,
                    data: action.data,
                    payload: entry.d,
                })
            }
            other => {
                warn!(
                    component = COMPONENT,
                    channel = %meta.channel,
                    kind = other,
                    "skipping entry with unknown kind"
                );
                return Ok(None);
            }
        };

        Ok(Some(event))
    }

    fn decode_presence(&self, meta: EventMeta, payload: Value) -> Result<Option<Event>, DecodeError> {
        let presence = WirePresence::deserialize(&payload)
            .map_err(|err| DecodeError(format!("presence event on {}: {err}", meta.channel)))?;
        let Some(action) = PresenceAction::parse(&presence.action) else {
            warn!(
                component = COMPONENT,
                channel = %meta.channel,
                action = %presence.action,
                "skipping presence event with unknown action"
            );
            return Ok(None);
        };

        Ok(Some(Event::Presence(PresenceEvent {
            meta,
            action,
            uuid: presence.uuid,
            occupancy: presence.occupancy,
            state: presence.data,
            join: presence.join,
            leave: presence.leave,
            timeout: presence.timeout,
            payload,
        })))
    }
}

impl Decoder for JsonDecoder {
    fn decode(&self, response: &Response) -> Result<SubscribeEnvelope, DecodeError> {
        let envelope: WireEnvelope = serde_json::from_slice(&response.body)
            .map_err(|err| DecodeError(err.to_string()))?;
        let cursor = parse_cursor(&envelope.t)?;

        let mut events = Vec::with_capacity(envelope.m.len());
        for entry in envelope.m {
            if let Some(event) = self.decode_entry(entry)? {
                events.push(event);
            }
        }

        Ok(SubscribeEnvelope { cursor, events })
    }
}
