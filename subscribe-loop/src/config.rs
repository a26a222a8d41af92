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

//! Subscriber configuration with the service client's defaults.

use crate::error::SubscribeError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_SUBSCRIBE_MAX_IDLE_SECS: u64 = 310;
pub const DEFAULT_NON_SUBSCRIBE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAXIMUM_MESSAGES_CACHE_SIZE: usize = 100;
pub const DEFAULT_LISTENER_QUEUE_CAPACITY: usize = 1024;
pub const MIN_PRESENCE_HEARTBEAT_VALUE: u32 = 20;
pub const MAX_PRESENCE_HEARTBEAT_VALUE: u32 = 300;

/// Which heartbeat outcomes are reported to listeners as statuses.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatNotifications {
    None,
    Success,
    #[default]
    Failure,
    All,
}

impl HeartbeatNotifications {
    pub fn notify_success(&self) -> bool {
        matches!(
            self,
            HeartbeatNotifications::Success | HeartbeatNotifications::All
        )
    }

    pub fn notify_failure(&self) -> bool {
        matches!(
            self,
            HeartbeatNotifications::Failure | HeartbeatNotifications::All
        )
    }
}

/// Backoff and bounded-retry settings for the long-poll.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction of the computed delay added or removed at random, in `0.0..=1.0`.
    pub jitter: f64,
    /// Consecutive malformed responses tolerated before the loop stops.
    pub max_malformed_retries: u32,
    /// `None` retries network failures forever.
    pub max_network_retries: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 32_000,
            jitter: 0.2,
            max_malformed_retries: 3,
            max_network_retries: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubscriberConfig {
    /// Identity announced on every request. Generated when left empty.
    pub user_id: String,
    pub subscribe_max_idle_secs: u64,
    pub non_subscribe_timeout_secs: u64,
    /// Server-side presence timeout; zero disables heartbeats.
    pub presence_heartbeat_value: u32,
    /// Zero derives `value / 2 - 1`.
    pub presence_heartbeat_interval: u32,
    pub heartbeat_notifications: HeartbeatNotifications,
    pub manage_presence_list_manually: bool,
    pub suppress_leave_events: bool,
    pub keep_timetoken_on_list_change: bool,
    pub restore_subscription: bool,
    pub catch_up_on_subscription_restore: bool,
    /// Batch size at which a `MessageCountExceeded` status is emitted; zero disables.
    pub request_message_count_threshold: usize,
    /// Dedup cache capacity; zero disables deduplication.
    pub maximum_messages_cache_size: usize,
    /// Deliveries buffered per listener; further deliveries to a full queue are dropped.
    pub listener_queue_capacity: usize,
    pub filter_expression: Option<String>,
    pub retry: RetryConfig,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            subscribe_max_idle_secs: DEFAULT_SUBSCRIBE_MAX_IDLE_SECS,
            non_subscribe_timeout_secs: DEFAULT_NON_SUBSCRIBE_TIMEOUT_SECS,
            presence_heartbeat_value: 0,
            presence_heartbeat_interval: 0,
            heartbeat_notifications: HeartbeatNotifications::default(),
            manage_presence_list_manually: false,
            suppress_leave_events: false,
            keep_timetoken_on_list_change: true,
            restore_subscription: true,
            catch_up_on_subscription_restore: true,
            request_message_count_threshold: 0,
            maximum_messages_cache_size: DEFAULT_MAXIMUM_MESSAGES_CACHE_SIZE,
            listener_queue_capacity: DEFAULT_LISTENER_QUEUE_CAPACITY,
            filter_expression: None,
            retry: RetryConfig::default(),
        }
    }
}

impl SubscriberConfig {
    /// Normalises derived values and rejects inconsistent settings.
    pub fn validated(mut self) -> Result<Self, SubscribeError> {
        if self.user_id.trim().is_empty() {
            self.user_id = uuid::Uuid::new_v4().to_string();
        }

        if self.subscribe_max_idle_secs == 0 || self.non_subscribe_timeout_secs == 0 {
            return Err(SubscribeError::configuration(
                "request timeouts must be greater than zero",
            ));
        }

        if self.listener_queue_capacity == 0 {
            return Err(SubscribeError::configuration(
                "listener_queue_capacity must be greater than zero",
            ));
        }

        if self.presence_heartbeat_value > 0 {
            self.presence_heartbeat_value = self
                .presence_heartbeat_value
                .clamp(MIN_PRESENCE_HEARTBEAT_VALUE, MAX_PRESENCE_HEARTBEAT_VALUE);
            if self.presence_heartbeat_interval == 0 {
                self.presence_heartbeat_interval = self.presence_heartbeat_value / 2 - 1;
            }
            if self.presence_heartbeat_interval >= self.presence_heartbeat_value {
                return Err(SubscribeError::configuration(format!(
                    "presence_heartbeat_interval ({}) must be less than presence_heartbeat_value ({})",
                    self.presence_heartbeat_interval, self.presence_heartbeat_value
                )));
            }
        } else {
            self.presence_heartbeat_interval = 0;
        }

        if let Some(filter) = &self.filter_expression {
            if filter.trim().is_empty() {
                self.filter_expression = None;
            }
        }

        let retry = &self.retry;
        if retry.initial_delay_ms == 0 || retry.max_delay_ms < retry.initial_delay_ms {
            return Err(SubscribeError::configuration(
                "retry delays must satisfy 0 < initial_delay_ms <= max_delay_ms",
            ));
        }
        if !(0.0..=1.0).contains(&retry.jitter) {
            return Err(SubscribeError::configuration(
                "retry jitter must be within 0.0..=1.0",
            ));
        }

        Ok(self)
    }

    pub fn subscribe_max_idle(&self) -> Duration {
        Duration::from_secs(self.subscribe_max_idle_secs)
    }

    pub fn non_subscribe_timeout(&self) -> Duration {
        Duration::from_secs(self.non_subscribe_timeout_secs)
    }

    pub fn heartbeat_enabled(&self) -> bool {
        self.presence_heartbeat_value > 0 && self.presence_heartbeat_interval > 0
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.presence_heartbeat_interval))
    }
}
