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

//! Requests handed from application calls to the driver task.

use crate::error::SubscribeError;
use crate::request::{PresenceRequest, SubscribeRequest, UnsubscribeRequest};
use crate::state::subscription_set::ClientState;
use tokio::sync::oneshot;

/// Completed once the driver has applied the command.
pub(crate) type Ack = oneshot::Sender<Result<(), SubscribeError>>;

pub(crate) enum Command {
    Subscribe {
        request: SubscribeRequest,
        ack: Ack,
    },
    Unsubscribe {
        request: UnsubscribeRequest,
        ack: Ack,
    },
    UnsubscribeAll {
        ack: Ack,
    },
    SetState {
        entity: String,
        state: Option<ClientState>,
        ack: Ack,
    },
    SetPresence {
        request: PresenceRequest,
        ack: Ack,
    },
    SetFilterExpression {
        filter_expression: Option<String>,
        ack: Ack,
    },
    Disconnect {
        ack: Ack,
    },
    Reconnect {
        ack: Ack,
    },
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Command::Subscribe { .. } => "subscribe",
            Command::Unsubscribe { .. } => "unsubscribe",
            Command::UnsubscribeAll { .. } => "unsubscribe_all",
            Command::SetState { .. } => "set_state",
            Command::SetPresence { .. } => "set_presence",
            Command::SetFilterExpression { .. } => "set_filter_expression",
            Command::Disconnect { .. } => "disconnect",
            Command::Reconnect { .. } => "reconnect",
        }
    }
}

/// Sends the result back; the caller may have gone away, which is fine.
pub(crate) fn complete(ack: Ack, result: Result<(), SubscribeError>) {
    let _ = ack.send(result);
}
