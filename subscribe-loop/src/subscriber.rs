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

//! Application-facing subscriber handle.

use crate::config::SubscriberConfig;
use crate::dispatch::dispatcher::EventDispatcher;
use crate::dispatch::listener::SubscribeListener;
use crate::engine::command::{Ack, Command};
use crate::engine::driver::{DriverCollaborators, LongPollDriver};
use crate::engine::heartbeat::HeartbeatCoordinator;
use crate::engine::EngineState;
use crate::error::SubscribeError;
use crate::request::{PresenceRequest, SubscribeRequest, UnsubscribeRequest};
use crate::state::cursor::Cursor;
use crate::state::subscription_set::{ClientState, SubscriptionSnapshot};
use crate::transport::{Cipher, Decoder, Transport};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::info;

const SUBSCRIBER_TAG: &str = "Subscriber";

/// Handle to one subscribe loop.
///
/// Mutating calls hand off to the driver task and return once it has applied the change.
/// Dropping the handle stops the loop and its heartbeat.
pub struct Subscriber {
    name: String,
    config: Arc<SubscriberConfig>,
    commands: mpsc::UnboundedSender<Command>,
    dispatcher: Arc<EventDispatcher>,
    snapshot: watch::Receiver<Arc<SubscriptionSnapshot>>,
    state: watch::Receiver<EngineState>,
    cursor: watch::Receiver<Option<Cursor>>,
    fault: watch::Receiver<Option<String>>,
    _driver: JoinHandle<()>,
    _heartbeat: Option<JoinHandle<()>>,
}

impl Subscriber {
    /// Validates `config` and spawns the driver (and heartbeat, when enabled) on the
    /// current tokio runtime.
    pub fn new(
        name: &str,
        config: SubscriberConfig,
        transport: Arc<dyn Transport>,
        decoder: Arc<dyn Decoder>,
        cipher: Option<Arc<dyn Cipher>>,
    ) -> Result<Self, SubscribeError> {
        let runtime = Handle::try_current().map_err(|_| {
            SubscribeError::configuration("Subscriber::new must be called within a tokio runtime")
        })?;
        let config = Arc::new(config.validated()?);
        let name = format!("{SUBSCRIBER_TAG}:{name}");

        let dispatcher = Arc::new(EventDispatcher::new(
            name.clone(),
            runtime.clone(),
            config.listener_queue_capacity,
        ));
        let (driver, channels) = LongPollDriver::new(
            &name,
            config.clone(),
            DriverCollaborators {
                transport: transport.clone(),
                decoder,
                cipher,
                dispatcher: dispatcher.clone(),
            },
        );

        let heartbeat = config.heartbeat_enabled().then(|| {
            HeartbeatCoordinator::new(&name, &config, transport, dispatcher.clone())
                .spawn(&runtime, channels.heartbeat_targets.clone())
        });
        let driver = driver.spawn(&runtime);

        info!(
            component = "subscriber",
            client = name.as_str(),
            user_id = config.user_id.as_str(),
            heartbeat = heartbeat.is_some(),
            "subscriber created"
        );

        Ok(Self {
            name,
            config,
            commands: channels.commands,
            dispatcher,
            snapshot: channels.snapshot,
            state: channels.state,
            cursor: channels.cursor,
            fault: channels.fault,
            _driver: driver,
            _heartbeat: heartbeat,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective configuration after validation.
    pub fn config(&self) -> &SubscriberConfig {
        &self.config
    }

    pub async fn subscribe(&self, request: SubscribeRequest) -> Result<(), SubscribeError> {
        request.validate()?;
        self.request(|ack| Command::Subscribe { request, ack }).await
    }

    pub async fn unsubscribe(&self, request: UnsubscribeRequest) -> Result<(), SubscribeError> {
        request.validate()?;
        self.request(|ack| Command::Unsubscribe { request, ack })
            .await
    }

    pub async fn unsubscribe_from_all(&self) -> Result<(), SubscribeError> {
        self.request(|ack| Command::UnsubscribeAll { ack }).await
    }

    /// Replaces the state attached to `entity`; `None` clears it. Sent with the next
    /// subscribe and heartbeat requests.
    pub async fn set_state(
        &self,
        entity: &str,
        state: Option<ClientState>,
    ) -> Result<(), SubscribeError> {
        if entity.trim().is_empty() {
            return Err(SubscribeError::configuration("entity name must not be empty"));
        }
        let entity = entity.to_string();
        self.request(|ack| Command::SetState { entity, state, ack })
            .await
    }

    /// Edits the heartbeat list. Only available with `manage_presence_list_manually`.
    pub async fn set_presence(&self, request: PresenceRequest) -> Result<(), SubscribeError> {
        request.validate()?;
        self.request(|ack| Command::SetPresence { request, ack })
            .await
    }

    pub async fn set_filter_expression(
        &self,
        filter_expression: Option<String>,
    ) -> Result<(), SubscribeError> {
        self.request(|ack| Command::SetFilterExpression {
            filter_expression,
            ack,
        })
        .await
    }

    /// Stops the loop but keeps the subscription set and cursor.
    pub async fn disconnect(&self) -> Result<(), SubscribeError> {
        self.request(|ack| Command::Disconnect { ack }).await
    }

    /// Resumes a stopped loop from the stored cursor.
    pub async fn reconnect(&self) -> Result<(), SubscribeError> {
        self.request(|ack| Command::Reconnect { ack }).await
    }

    /// Returns `false` if the same listener allocation is already registered.
    pub fn add_listener(&self, listener: Arc<dyn SubscribeListener>) -> bool {
        self.dispatcher.add_listener(listener)
    }

    pub fn remove_listener(&self, listener: &Arc<dyn SubscribeListener>) -> bool {
        self.dispatcher.remove_listener(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.dispatcher.listener_count()
    }

    pub fn channels(&self) -> Vec<String> {
        self.snapshot.borrow().channels.clone()
    }

    pub fn channel_groups(&self) -> Vec<String> {
        self.snapshot.borrow().channel_groups.clone()
    }

    /// Presence companions of both channels and groups.
    pub fn presence_channels(&self) -> Vec<String> {
        let snapshot = self.snapshot.borrow();
        snapshot
            .presence_channels
            .iter()
            .chain(snapshot.presence_groups.iter())
            .cloned()
            .collect()
    }

    pub fn is_subscribed(&self, name: &str) -> bool {
        self.snapshot.borrow().contains(name)
    }

    pub fn snapshot(&self) -> Arc<SubscriptionSnapshot> {
        self.snapshot.borrow().clone()
    }

    /// Stored read position; `None` means the next request starts at "now".
    pub fn current_cursor(&self) -> Option<Cursor> {
        *self.cursor.borrow()
    }

    pub fn engine_state(&self) -> EngineState {
        *self.state.borrow()
    }

    async fn request<F>(&self, build: F) -> Result<(), SubscribeError>
    where
        F: FnOnce(Ack) -> Command,
    {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(build(ack))
            .map_err(|_| closed_error(&self.fault))?;
        done.await.map_err(|_| closed_error(&self.fault))?
    }
}

/// Error for a call that found the driver gone.
fn closed_error(fault: &watch::Receiver<Option<String>>) -> SubscribeError {
    match fault.borrow().as_ref() {
        Some(reason) => SubscribeError::Internal(reason.clone()),
        None => SubscribeError::ClientClosed,
    }
}

#[cfg(test)]
mod tests {
    use super::closed_error;
    use crate::error::SubscribeError;
    use tokio::sync::watch;

    #[test]
    fn closed_driver_reports_recorded_fault() {
        let (fault_tx, fault) = watch::channel(None);
        assert_eq!(closed_error(&fault), SubscribeError::ClientClosed);

        fault_tx.send_replace(Some("dedup cache order holds 2 entries".to_string()));
        drop(fault_tx);

        assert_eq!(
            closed_error(&fault),
            SubscribeError::Internal("dedup cache order holds 2 entries".to_string())
        );
    }
}
