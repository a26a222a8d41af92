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

//! Application-facing request builders for composition changes.

use crate::error::SubscribeError;
use crate::state::cursor::Timetoken;
use crate::state::subscription_set::{validate_names, ClientState};

fn to_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

fn validate_targets(channels: &[String], channel_groups: &[String]) -> Result<(), SubscribeError> {
    if channels.is_empty() && channel_groups.is_empty() {
        return Err(SubscribeError::configuration(
            "at least one channel or channel group is required",
        ));
    }
    validate_names(channels, "channel")?;
    validate_names(channel_groups, "channel group")
}

/// Adds channels and groups to the active subscription.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubscribeRequest {
    pub channels: Vec<String>,
    pub channel_groups: Vec<String>,
    /// Also receive presence events for each non-presence name.
    pub with_presence: bool,
    /// State attached to every name in this request.
    pub state: Option<ClientState>,
    /// Explicit start position; zero means "now".
    pub timetoken: Option<Timetoken>,
}

impl SubscribeRequest {
    pub fn channels<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: to_names(channels),
            ..Default::default()
        }
    }

    pub fn channel_groups<I, S>(channel_groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channel_groups: to_names(channel_groups),
            ..Default::default()
        }
    }

    pub fn and_channel_groups<I, S>(mut self, channel_groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channel_groups.extend(to_names(channel_groups));
        self
    }

    pub fn with_presence(mut self) -> Self {
        self.with_presence = true;
        self
    }

    pub fn with_state(mut self, state: ClientState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_timetoken(mut self, timetoken: impl Into<Timetoken>) -> Self {
        self.timetoken = Some(timetoken.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SubscribeError> {
        validate_targets(&self.channels, &self.channel_groups)
    }
}

/// Removes channels and groups from the active subscription.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnsubscribeRequest {
    pub channels: Vec<String>,
    pub channel_groups: Vec<String>,
    /// Also drop the presence companions of each name.
    pub with_presence: bool,
}

impl UnsubscribeRequest {
    pub fn channels<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: to_names(channels),
            with_presence: true,
            ..Default::default()
        }
    }

    pub fn channel_groups<I, S>(channel_groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channel_groups: to_names(channel_groups),
            with_presence: true,
            ..Default::default()
        }
    }

    pub fn and_channel_groups<I, S>(mut self, channel_groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channel_groups.extend(to_names(channel_groups));
        self
    }

    /// Keeps presence companions subscribed.
    pub fn keep_presence(mut self) -> Self {
        self.with_presence = false;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SubscribeError> {
        validate_targets(&self.channels, &self.channel_groups)
    }
}

/// Manual presence update, used when the presence list is managed by the application.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PresenceRequest {
    pub channels: Vec<String>,
    pub channel_groups: Vec<String>,
    /// `true` starts heartbeating the names, `false` removes them and announces a leave.
    pub connected: bool,
}

impl PresenceRequest {
    pub fn connect<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: to_names(channels),
            connected: true,
            ..Default::default()
        }
    }

    pub fn disconnect<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: to_names(channels),
            connected: false,
            ..Default::default()
        }
    }

    pub fn and_channel_groups<I, S>(mut self, channel_groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channel_groups.extend(to_names(channel_groups));
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SubscribeError> {
        validate_targets(&self.channels, &self.channel_groups)
    }
}
