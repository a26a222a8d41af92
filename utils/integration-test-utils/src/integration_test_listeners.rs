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

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use subscribe_loop::{
    MessageActionEvent, MessageEvent, ObjectEvent, PresenceEvent, Status, StatusCategory,
    SubscribeListener,
};
use tokio::sync::Notify;
use tracing::debug;

/// Everything a listener was handed, in delivery order.
#[derive(Clone, Debug, PartialEq)]
pub enum Recorded {
    Message(MessageEvent),
    Signal(MessageEvent),
    Presence(PresenceEvent),
    Object(ObjectEvent),
    Membership(ObjectEvent),
    MessageAction(MessageActionEvent),
    Status(Status),
}

#[derive(Clone, Default)]
pub struct RecordingListener {
    store: Arc<Mutex<Vec<Recorded>>>,
    updated: Arc<Notify>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        match self.store.lock() {
            Ok(store) => store.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn messages(&self) -> Vec<MessageEvent> {
        self.recorded()
            .into_iter()
            .filter_map(|entry| match entry {
                Recorded::Message(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn presence(&self) -> Vec<PresenceEvent> {
        self.recorded()
            .into_iter()
            .filter_map(|entry| match entry {
                Recorded::Presence(presence) => Some(presence),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<Status> {
        self.recorded()
            .into_iter()
            .filter_map(|entry| match entry {
                Recorded::Status(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn status_categories(&self) -> Vec<StatusCategory> {
        self.statuses()
            .into_iter()
            .map(|status| status.category)
            .collect()
    }

    /// Waits until `predicate` holds for the recorded entries.
    pub async fn wait_until<F>(&self, description: &str, predicate: F)
    where
        F: Fn(&[Recorded]) -> bool,
    {
        let waited = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let notified = self.updated.notified();
                if predicate(&self.recorded()) {
                    return;
                }
                notified.await;
            }
        })
        .await;

        if waited.is_err() {
            panic!(
                "timed out waiting for {description}; recorded: {:?}",
                self.recorded()
            );
        }
    }

    pub async fn wait_for_messages(&self, count: usize) -> Vec<MessageEvent> {
        self.wait_until(&format!("{count} messages"), |recorded| {
            recorded
                .iter()
                .filter(|entry| matches!(entry, Recorded::Message(_)))
                .count()
                >= count
        })
        .await;
        self.messages()
    }

    pub async fn wait_for_status(&self, category: StatusCategory) -> Status {
        self.wait_until(&format!("status {category}"), |recorded| {
            recorded
                .iter()
                .any(|entry| matches!(entry, Recorded::Status(status) if status.category == category))
        })
        .await;

        self.statuses()
            .into_iter()
            .find(|status| status.category == category)
            .unwrap_or_else(|| panic!("status {category} disappeared"))
    }

    fn record(&self, entry: Recorded) {
        debug!(entry = ?entry, "recording listener received entry");
        match self.store.lock() {
            Ok(mut store) => store.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
        self.updated.notify_waiters();
    }
}

#[async_trait]
impl SubscribeListener for RecordingListener {
    async fn on_message(&self, message: MessageEvent) {
        self.record(Recorded::Message(message));
    }

    async fn on_signal(&self, signal: MessageEvent) {
        self.record(Recorded::Signal(signal));
    }

    async fn on_presence(&self, presence: PresenceEvent) {
        self.record(Recorded::Presence(presence));
    }

    async fn on_object(&self, object: ObjectEvent) {
        self.record(Recorded::Object(object));
    }

    async fn on_membership(&self, membership: ObjectEvent) {
        self.record(Recorded::Membership(membership));
    }

    async fn on_message_action(&self, action: MessageActionEvent) {
        self.record(Recorded::MessageAction(action));
    }

    async fn on_status(&self, status: Status) {
        self.record(Recorded::Status(status));
    }
}
