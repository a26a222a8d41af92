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

//! Builders for v2 subscribe response bodies.

use bytes::Bytes;
use serde_json::{json, Value};
use subscribe_loop::Response;

pub const TEST_REGION: u32 = 4;

/// One published message on `channel` at `timetoken`.
pub fn message_entry(channel: &str, timetoken: u64, payload: Value) -> Value {
    json!({
        "a": "1",
        "f": 0,
        "i": "publisher-1",
        "p": { "t": timetoken.to_string(), "r": TEST_REGION },
        "k": "sub-c-test",
        "c": channel,
        "d": payload,
    })
}

/// Signal entries carry `"e": 1`.
pub fn signal_entry(channel: &str, timetoken: u64, payload: Value) -> Value {
    let mut entry = message_entry(channel, timetoken, payload);
    entry["e"] = json!(1);
    entry
}

/// Presence event delivered on the `-pnpres` companion of `channel`.
pub fn presence_entry(channel: &str, timetoken: u64, action: &str, uuid: &str, occupancy: u64) -> Value {
    message_entry(
        &format!("{channel}-pnpres"),
        timetoken,
        json!({
            "action": action,
            "uuid": uuid,
            "occupancy": occupancy,
            "timestamp": timetoken / 10_000_000,
        }),
    )
}

/// Entry matched through a channel group subscription.
pub fn group_message_entry(group: &str, channel: &str, timetoken: u64, payload: Value) -> Value {
    let mut entry = message_entry(channel, timetoken, payload);
    entry["b"] = json!(group);
    entry
}

pub fn subscribe_body(timetoken: u64, entries: Vec<Value>) -> String {
    json!({
        "t": { "t": timetoken.to_string(), "r": TEST_REGION },
        "m": entries,
    })
    .to_string()
}

pub fn subscribe_response(timetoken: u64, entries: Vec<Value>) -> Response {
    Response::new(200, Bytes::from(subscribe_body(timetoken, entries)))
}

/// Empty batch, as returned for the initial handshake or an idle window.
pub fn handshake_response(timetoken: u64) -> Response {
    subscribe_response(timetoken, Vec::new())
}
