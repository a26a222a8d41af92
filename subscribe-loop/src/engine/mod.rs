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

//! Long-poll driver, retry policy and presence tasks.

pub(crate) mod command;
pub(crate) mod driver;
pub(crate) mod heartbeat;
pub(crate) mod presence;
pub(crate) mod retry;

use std::fmt::{Display, Formatter};

/// Observable phase of the long-poll loop.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum EngineState {
    /// Never started.
    #[default]
    Idle,
    /// A request is about to be issued for a new or changed composition.
    Starting,
    /// A long-poll is in flight.
    Waiting,
    /// A response is being decoded and dispatched.
    Processing,
    /// Waiting out a retry delay.
    Backoff,
    Stopped,
}

impl EngineState {
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            EngineState::Starting
                | EngineState::Waiting
                | EngineState::Processing
                | EngineState::Backoff
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Starting => "starting",
            EngineState::Waiting => "waiting",
            EngineState::Processing => "processing",
            EngineState::Backoff => "backoff",
            EngineState::Stopped => "stopped",
        }
    }
}

impl Display for EngineState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
