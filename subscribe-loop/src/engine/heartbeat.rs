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

//! Periodic presence heartbeat, independent of the long-poll cycle.

use crate::config::{HeartbeatNotifications, SubscriberConfig};
use crate::dispatch::dispatcher::EventDispatcher;
use crate::engine::retry::FailureKind;
use crate::event::{Status, StatusCategory};
use crate::observability::events;
use crate::observability::fields::{self, WorkerContext};
use crate::state::subscription_set::ClientState;
use crate::transport::{Operation, Request, Transport, TransportError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

const COMPONENT: &str = "heartbeat";

/// Entities the next heartbeat announces, published by the driver.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct HeartbeatTargets {
    pub(crate) channels: Vec<String>,
    pub(crate) channel_groups: Vec<String>,
    pub(crate) state: BTreeMap<String, ClientState>,
}

impl HeartbeatTargets {
    pub(crate) fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.channel_groups.is_empty()
    }
}

pub(crate) struct HeartbeatCoordinator {
    context: WorkerContext,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<EventDispatcher>,
    user_id: String,
    presence_timeout: u32,
    period: Duration,
    request_timeout: Duration,
    notifications: HeartbeatNotifications,
}

impl HeartbeatCoordinator {
    pub(crate) fn new(
        client: &str,
        config: &SubscriberConfig,
        transport: Arc<dyn Transport>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            context: WorkerContext::new(client, "heartbeat"),
            transport,
            dispatcher,
            user_id: config.user_id.clone(),
            presence_timeout: config.presence_heartbeat_value,
            period: config.heartbeat_interval(),
            request_timeout: config.non_subscribe_timeout(),
            notifications: config.heartbeat_notifications,
        }
    }

    /// Runs until the driver drops the targets channel.
    pub(crate) fn spawn(
        self,
        runtime: &Handle,
        targets: watch::Receiver<Arc<HeartbeatTargets>>,
    ) -> JoinHandle<()> {
        runtime.spawn(self.run(targets))
    }

    async fn run(self, mut targets: watch::Receiver<Arc<HeartbeatTargets>>) {
        info!(
            event = events::HEARTBEAT_START,
            component = COMPONENT,
            client = self.context.client.as_str(),
            period_secs = self.period.as_secs(),
            "heartbeat started"
        );

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; subscribe requests already announce presence.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let current = targets.borrow().clone();
                    self.beat(&current).await;
                }
                changed = targets.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(
            event = events::HEARTBEAT_STOP,
            component = COMPONENT,
            client = self.context.client.as_str(),
            reason = fields::REASON_SHUTDOWN,
            "heartbeat stopped"
        );
    }

    pub(crate) async fn beat(&self, targets: &HeartbeatTargets) {
        if targets.is_empty() {
            trace!(
                event = events::HEARTBEAT_SKIPPED,
                component = COMPONENT,
                client = self.context.client.as_str(),
                "nothing to announce"
            );
            return;
        }

        let request = Request {
            operation: Operation::Heartbeat,
            user_id: self.user_id.clone(),
            channels: targets.channels.clone(),
            channel_groups: targets.channel_groups.clone(),
            state: targets.state.clone(),
            heartbeat: Some(self.presence_timeout),
            timeout: self.request_timeout,
            ..Default::default()
        };

        debug!(
            event = events::HEARTBEAT_SEND,
            component = COMPONENT,
            client = self.context.client.as_str(),
            channels = %fields::format_names(&targets.channels),
            channel_groups = %fields::format_names(&targets.channel_groups),
            "sending heartbeat"
        );

        let outcome = match tokio::time::timeout(self.request_timeout, self.transport.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };

        let failure = match outcome {
            Ok(response) if response.is_success() => None,
            Ok(response) => Some((
                FailureKind::from_http_status(response.status, false).category(),
                format!("heartbeat rejected with status {}", response.status),
            )),
            Err(err) => Some((
                FailureKind::from_transport_error(&err).category(),
                err.to_string(),
            )),
        };

        match failure {
            None => {
                debug!(
                    event = events::HEARTBEAT_OK,
                    component = COMPONENT,
                    client = self.context.client.as_str(),
                    "heartbeat acknowledged"
                );
                if self.notifications.notify_success() {
                    self.notify(targets, StatusCategory::Acknowledgment, None);
                }
            }
            Some((category, message)) => {
                warn!(
                    event = events::HEARTBEAT_FAILED,
                    component = COMPONENT,
                    client = self.context.client.as_str(),
                    category = category.as_str(),
                    err = message.as_str(),
                    "heartbeat failed"
                );
                if self.notifications.notify_failure() {
                    self.notify(targets, category, Some(message));
                }
            }
        }
    }

    fn notify(&self, targets: &HeartbeatTargets, category: StatusCategory, message: Option<String>) {
        let mut status = Status::new(category, Operation::Heartbeat);
        status.affected_channels = targets.channels.clone();
        status.affected_channel_groups = targets.channel_groups.clone();
        status.subscribed_channels = targets.channels.clone();
        status.subscribed_channel_groups = targets.channel_groups.clone();
        status.message = message;
        self.dispatcher.dispatch_status(status);
    }
}
