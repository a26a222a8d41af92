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

//! Canonical structured field values and value-format helpers.

use crate::state::cursor::Cursor;
use crate::state::dedup_cache::Fingerprint;

pub const NONE: &str = "none";
pub const NOW: &str = "now";
pub const REASON_QUEUE_CLOSED: &str = "queue_closed";
pub const REASON_RESTART: &str = "restart";
pub const REASON_STOP: &str = "stop";
pub const REASON_SHUTDOWN: &str = "shutdown";

/// Identity of a spawned worker for correlation logs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkerContext {
    pub client: String,
    pub worker_id: String,
}

impl WorkerContext {
    pub fn new(client: impl Into<String>, worker_id: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            worker_id: worker_id.into(),
        }
    }
}

/// Comma-joined names, or `none` for an empty list.
pub fn format_names(names: &[String]) -> String {
    if names.is_empty() {
        NONE.to_string()
    } else {
        names.join(",")
    }
}

/// `timetoken@region`, or `now` when the loop has no stored cursor.
pub fn format_cursor(cursor: Option<Cursor>) -> String {
    cursor
        .map(|cursor| cursor.to_string())
        .unwrap_or_else(|| NOW.to_string())
}

pub fn format_fingerprint(fingerprint: &Fingerprint) -> String {
    format!(
        "{}/{}/{:016x}",
        fingerprint.channel(),
        fingerprint.timetoken(),
        fingerprint.payload_hash()
    )
}
