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

//! Manually managed presence list and leave announcements.

use crate::observability::events;
use crate::observability::fields::{self, WorkerContext};
use crate::transport::{Operation, Request, Transport};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const COMPONENT: &str = "presence";

/// Channels and groups heartbeated when the application manages presence itself.
#[derive(Debug, Default)]
pub(crate) struct PresenceList {
    channels: BTreeSet<String>,
    channel_groups: BTreeSet<String>,
}

impl PresenceList {
    /// Returns `true` if anything was added.
    pub(crate) fn add(&mut self, channels: &[String], channel_groups: &[String]) -> bool {
        let mut changed = false;
        for channel in channels {
            changed |= self.channels.insert(channel.clone());
        }
        for group in channel_groups {
            changed |= self.channel_groups.insert(group.clone());
        }
        changed
    }

    /// Returns the names actually removed.
    pub(crate) fn remove(
        &mut self,
        channels: &[String],
        channel_groups: &[String],
    ) -> (Vec<String>, Vec<String>) {
        let channels = channels
            .iter()
            .filter(|name| self.channels.remove(name.as_str()))
            .cloned()
            .collect();
        let channel_groups = channel_groups
            .iter()
            .filter(|name| self.channel_groups.remove(name.as_str()))
            .cloned()
            .collect();
        (channels, channel_groups)
    }

    pub(crate) fn channels(&self) -> Vec<String> {
        self.channels.iter().cloned().collect()
    }

    pub(crate) fn channel_groups(&self) -> Vec<String> {
        self.channel_groups.iter().cloned().collect()
    }
}

/// Sends leave requests on their own tasks so the loop never waits on them.
#[derive(Clone)]
pub(crate) struct LeaveAnnouncer {
    context: Arc<WorkerContext>,
    transport: Arc<dyn Transport>,
    user_id: String,
    timeout: Duration,
}

impl LeaveAnnouncer {
    pub(crate) fn new(
        client: &str,
        transport: Arc<dyn Transport>,
        user_id: String,
        timeout: Duration,
    ) -> Self {
        Self {
            context: Arc::new(WorkerContext::new(client, "leave")),
            transport,
            user_id,
            timeout,
        }
    }

    pub(crate) fn announce(&self, channels: Vec<String>, channel_groups: Vec<String>) {
        if channels.is_empty() && channel_groups.is_empty() {
            return;
        }

        let request = Request {
            operation: Operation::Leave,
            user_id: self.user_id.clone(),
            channels,
            channel_groups,
            timeout: self.timeout,
            ..Default::default()
        };
        let announcer = self.clone();
        tokio::spawn(async move { announcer.send(request).await });
    }

    async fn send(&self, request: Request) {
        let channels = fields::format_names(&request.channels);
        let channel_groups = fields::format_names(&request.channel_groups);
        debug!(
            event = events::LEAVE_SEND,
            component = COMPONENT,
            client = self.context.client.as_str(),
            channels = channels.as_str(),
            channel_groups = channel_groups.as_str(),
            "announcing leave"
        );

        let outcome = tokio::time::timeout(self.timeout, self.transport.send(request)).await;
        match outcome {
            Ok(Ok(response)) if response.is_success() => {
                debug!(
                    event = events::LEAVE_OK,
                    component = COMPONENT,
                    client = self.context.client.as_str(),
                    channels = channels.as_str(),
                    "leave acknowledged"
                );
            }
            Ok(Ok(response)) => {
                warn!(
                    event = events::LEAVE_FAILED,
                    component = COMPONENT,
                    client = self.context.client.as_str(),
                    channels = channels.as_str(),
                    status = response.status,
                    "leave rejected"
                );
            }
            Ok(Err(err)) => {
                warn!(
                    event = events::LEAVE_FAILED,
                    component = COMPONENT,
                    client = self.context.client.as_str(),
                    channels = channels.as_str(),
                    err = %err,
                    "leave failed"
                );
            }
            Err(_) => {
                warn!(
                    event = events::LEAVE_FAILED,
                    component = COMPONENT,
                    client = self.context.client.as_str(),
                    channels = channels.as_str(),
                    reason = "timeout",
                    "leave timed out"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PresenceList;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn presence_list_tracks_added_and_removed_names() {
        let mut list = PresenceList::default();

        assert!(list.add(&names(&["room1", "room2"]), &names(&["lobby"])));
        assert!(!list.add(&names(&["room1"]), &[]));

        let (channels, groups) = list.remove(&names(&["room1", "missing"]), &names(&["lobby"]));
        assert_eq!(channels, names(&["room1"]));
        assert_eq!(groups, names(&["lobby"]));
        assert_eq!(list.channels(), names(&["room2"]));
        assert!(list.channel_groups().is_empty());
    }
}
