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

//! Canonical structured event names used across `subscribe-loop`.

// Driver and long-poll lifecycle events.
pub const DRIVER_START: &str = "driver_start";
pub const DRIVER_STOP: &str = "driver_stop";
pub const DRIVER_ABORT: &str = "driver_abort";
pub const ENGINE_STATE_CHANGE: &str = "engine_state_change";
pub const LONG_POLL_ISSUE: &str = "long_poll_issue";
pub const LONG_POLL_CANCELLED: &str = "long_poll_cancelled";
pub const LONG_POLL_STALE_DISCARDED: &str = "long_poll_stale_discarded";
pub const LONG_POLL_RESPONSE: &str = "long_poll_response";
pub const LONG_POLL_FAILED: &str = "long_poll_failed";
pub const LONG_POLL_BACKOFF: &str = "long_poll_backoff";
pub const LONG_POLL_GIVE_UP: &str = "long_poll_give_up";

// Subscription state events.
pub const SUBSCRIPTION_CHANGED: &str = "subscription_changed";
pub const CURSOR_ADVANCED: &str = "cursor_advanced";
pub const CURSOR_RESET: &str = "cursor_reset";
pub const CURSOR_REGRESSION_IGNORED: &str = "cursor_regression_ignored";
pub const DEDUP_SUPPRESSED: &str = "dedup_suppressed";
pub const DEDUP_INTEGRITY_FAILED: &str = "dedup_integrity_failed";
pub const DECRYPT_FAILED: &str = "decrypt_failed";
pub const MESSAGE_COUNT_EXCEEDED: &str = "message_count_exceeded";

// Presence events.
pub const HEARTBEAT_START: &str = "heartbeat_start";
pub const HEARTBEAT_SEND: &str = "heartbeat_send";
pub const HEARTBEAT_OK: &str = "heartbeat_ok";
pub const HEARTBEAT_FAILED: &str = "heartbeat_failed";
pub const HEARTBEAT_SKIPPED: &str = "heartbeat_skipped";
pub const HEARTBEAT_STOP: &str = "heartbeat_stop";
pub const LEAVE_SEND: &str = "leave_send";
pub const LEAVE_OK: &str = "leave_ok";
pub const LEAVE_FAILED: &str = "leave_failed";

// Listener dispatch events.
pub const LISTENER_ADD: &str = "listener_add";
pub const LISTENER_ADD_DUPLICATE: &str = "listener_add_duplicate";
pub const LISTENER_REMOVE: &str = "listener_remove";
pub const LISTENER_DELIVER: &str = "listener_deliver";
pub const LISTENER_QUEUE_CLOSED: &str = "listener_queue_closed";
pub const LISTENER_QUEUE_FULL: &str = "listener_queue_full";
pub const LISTENER_WORKER_STOP: &str = "listener_worker_stop";
