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

use serde::{Deserialize, Serialize};
use std::path::Path;
use subscribe_http::HttpTransportConfig;
use subscribe_loop::{SubscribeRequest, SubscriberConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("unable to parse config file {path}: {source}")]
    Parse { path: String, source: json5::Error },

    #[error("subscription must name at least one channel or channel group")]
    EmptySubscription,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub(crate) subscriber: SubscriberConfig,
    pub(crate) http: HttpTransportConfig,
    pub(crate) subscription: SubscriptionConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionConfig {
    #[serde(default)]
    pub(crate) channels: Vec<String>,
    #[serde(default)]
    pub(crate) channel_groups: Vec<String>,
    #[serde(default)]
    pub(crate) with_presence: bool,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        json5::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

impl SubscriptionConfig {
    pub fn to_request(&self) -> Result<SubscribeRequest, ConfigError> {
        if self.channels.is_empty() && self.channel_groups.is_empty() {
            return Err(ConfigError::EmptySubscription);
        }

        let request = SubscribeRequest::channels(self.channels.iter().cloned())
            .and_channel_groups(self.channel_groups.iter().cloned());
        Ok(if self.with_presence {
            request.with_presence()
        } else {
            request
        })
    }
}
