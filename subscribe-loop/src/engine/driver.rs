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

//! The long-poll driver task.
//!
//! One driver owns the subscription set, cursor, dedup cache and retry bookkeeping for a
//! subscriber. Application calls reach it as [`Command`]s; each long-poll runs on its own
//! task tagged with a generation number, and only the outcome of the current generation is
//! ever applied. Restarting or stopping aborts the in-flight task, which drops the transport
//! future and with it the connection.

use crate::config::SubscriberConfig;
use crate::dispatch::dispatcher::EventDispatcher;
use crate::engine::command::{complete, Command};
use crate::engine::heartbeat::HeartbeatTargets;
use crate::engine::presence::{LeaveAnnouncer, PresenceList};
use crate::engine::retry::{FailureKind, RetryController, RetryDecision, RetryPolicy};
use crate::engine::EngineState;
use crate::error::SubscribeError;
use crate::event::{Event, Status, StatusCategory};
use crate::observability::events;
use crate::observability::fields;
use crate::request::{PresenceRequest, SubscribeRequest, UnsubscribeRequest};
use crate::state::cursor::{Cursor, CursorPosition, Timetoken};
use crate::state::dedup_cache::DedupCache;
use crate::state::subscription_set::{Removed, SubscriptionSet, SubscriptionSnapshot};
use crate::transport::{
    Cipher, Decoder, Operation, Request, Response, SubscribeEnvelope, Transport, TransportError,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn, Level};

const COMPONENT: &str = "long_poll_driver";

/// External collaborators used by the driver.
pub(crate) struct DriverCollaborators {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) decoder: Arc<dyn Decoder>,
    pub(crate) cipher: Option<Arc<dyn Cipher>>,
    pub(crate) dispatcher: Arc<EventDispatcher>,
}

/// Application-side ends of the driver's channels.
pub(crate) struct DriverChannels {
    pub(crate) commands: mpsc::UnboundedSender<Command>,
    pub(crate) snapshot: watch::Receiver<Arc<SubscriptionSnapshot>>,
    pub(crate) state: watch::Receiver<EngineState>,
    pub(crate) cursor: watch::Receiver<Option<Cursor>>,
    pub(crate) heartbeat_targets: watch::Receiver<Arc<HeartbeatTargets>>,
    /// Set once if the driver aborts on a broken internal invariant.
    pub(crate) fault: watch::Receiver<Option<String>>,
}

struct InFlight {
    generation: u64,
    task: JoinHandle<()>,
}

struct PollOutcome {
    generation: u64,
    result: Result<Response, TransportError>,
}

enum Flow {
    Continue,
    Abort,
}

pub(crate) struct LongPollDriver {
    client: String,
    config: Arc<SubscriberConfig>,
    transport: Arc<dyn Transport>,
    decoder: Arc<dyn Decoder>,
    cipher: Option<Arc<dyn Cipher>>,
    dispatcher: Arc<EventDispatcher>,
    leave: LeaveAnnouncer,

    set: SubscriptionSet,
    presence_list: PresenceList,
    cursor: CursorPosition,
    last_timetoken: Option<Timetoken>,
    dedup: DedupCache,
    retry: RetryController,
    state: EngineState,
    connect_affected: (Vec<String>, Vec<String>),

    generation: u64,
    in_flight: Option<InFlight>,
    backoff_until: Option<Instant>,

    commands: mpsc::UnboundedReceiver<Command>,
    poll_results_tx: mpsc::UnboundedSender<PollOutcome>,
    poll_results: mpsc::UnboundedReceiver<PollOutcome>,
    snapshot_tx: watch::Sender<Arc<SubscriptionSnapshot>>,
    state_tx: watch::Sender<EngineState>,
    cursor_tx: watch::Sender<Option<Cursor>>,
    targets_tx: watch::Sender<Arc<HeartbeatTargets>>,
    fault_tx: watch::Sender<Option<String>>,
}

impl LongPollDriver {
    pub(crate) fn new(
        client: &str,
        config: Arc<SubscriberConfig>,
        collaborators: DriverCollaborators,
    ) -> (Self, DriverChannels) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (poll_results_tx, poll_results) = mpsc::unbounded_channel();
        let set = SubscriptionSet::new(config.filter_expression.clone());
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(set.snapshot()));
        let (state_tx, state_rx) = watch::channel(EngineState::Idle);
        let (cursor_tx, cursor_rx) = watch::channel(None);
        let (targets_tx, targets_rx) = watch::channel(Arc::new(HeartbeatTargets::default()));
        let (fault_tx, fault_rx) = watch::channel(None);

        let leave = LeaveAnnouncer::new(
            client,
            collaborators.transport.clone(),
            config.user_id.clone(),
            config.non_subscribe_timeout(),
        );

        let driver = Self {
            client: client.to_string(),
            transport: collaborators.transport,
            decoder: collaborators.decoder,
            cipher: collaborators.cipher,
            dispatcher: collaborators.dispatcher,
            leave,
            set,
            presence_list: PresenceList::default(),
            cursor: CursorPosition::new(),
            last_timetoken: None,
            dedup: DedupCache::new(config.maximum_messages_cache_size),
            retry: RetryController::new(RetryPolicy::from_config(&config)),
            state: EngineState::Idle,
            connect_affected: (Vec::new(), Vec::new()),
            generation: 0,
            in_flight: None,
            backoff_until: None,
            commands,
            poll_results_tx,
            poll_results,
            snapshot_tx,
            state_tx,
            cursor_tx,
            targets_tx,
            fault_tx,
            config,
        };

        let channels = DriverChannels {
            commands: commands_tx,
            snapshot: snapshot_rx,
            state: state_rx,
            cursor: cursor_rx,
            heartbeat_targets: targets_rx,
            fault: fault_rx,
        };

        (driver, channels)
    }

    pub(crate) fn spawn(self, runtime: &tokio::runtime::Handle) -> JoinHandle<()> {
        runtime.spawn(self.run())
    }

    async fn run(mut self) {
        info!(
            event = events::DRIVER_START,
            component = COMPONENT,
            client = self.client.as_str(),
            "subscribe driver started"
        );

        loop {
            let backoff_until = self.backoff_until;
            let flow = tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => {
                        self.handle_command(command);
                        Flow::Continue
                    }
                    None => {
                        self.stop_loop(fields::REASON_SHUTDOWN);
                        info!(
                            event = events::DRIVER_STOP,
                            component = COMPONENT,
                            client = self.client.as_str(),
                            reason = fields::REASON_SHUTDOWN,
                            "subscriber dropped; stopping driver"
                        );
                        break;
                    }
                },
                Some(outcome) = self.poll_results.recv() => self.handle_outcome(outcome),
                _ = tokio::time::sleep_until(backoff_until.unwrap_or_else(Instant::now)),
                    if backoff_until.is_some() =>
                {
                    self.backoff_until = None;
                    self.issue_poll();
                    Flow::Continue
                }
            };

            if let Flow::Abort = flow {
                error!(
                    event = events::DRIVER_ABORT,
                    component = COMPONENT,
                    client = self.client.as_str(),
                    "subscribe driver aborted"
                );
                break;
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        debug!(
            event = events::SUBSCRIPTION_CHANGED,
            component = COMPONENT,
            client = self.client.as_str(),
            command = command.name(),
            "applying command"
        );

        match command {
            Command::Subscribe { request, ack } => {
                self.subscribe(request);
                complete(ack, Ok(()));
            }
            Command::Unsubscribe { request, ack } => {
                self.unsubscribe(request);
                complete(ack, Ok(()));
            }
            Command::UnsubscribeAll { ack } => {
                let removed = self.set.remove_all();
                if !removed.is_empty() {
                    self.publish_subscription();
                    let (channels, channel_groups) = removed.leave_targets();
                    self.announce_leave(channels, channel_groups, false);
                    self.finish_unsubscribe(removed);
                }
                complete(ack, Ok(()));
            }
            Command::SetState { entity, state, ack } => {
                self.set.set_state(&entity, state);
                self.publish_subscription();
                complete(ack, Ok(()));
            }
            Command::SetPresence { request, ack } => {
                let result = self.set_presence(request);
                complete(ack, result);
            }
            Command::SetFilterExpression {
                filter_expression,
                ack,
            } => {
                let filter_expression =
                    filter_expression.filter(|expression| !expression.trim().is_empty());
                if self.set.set_filter_expression(filter_expression) {
                    self.publish_subscription();
                    if self.state.is_running() {
                        self.restart(fields::REASON_RESTART);
                    }
                }
                complete(ack, Ok(()));
            }
            Command::Disconnect { ack } => {
                if self.state.is_running() {
                    self.stop_loop(fields::REASON_STOP);
                    let mut status = self.status(StatusCategory::Disconnected, Operation::Subscribe);
                    status.affected_channels = status.subscribed_channels.clone();
                    status.affected_channel_groups = status.subscribed_channel_groups.clone();
                    status.terminal = true;
                    self.dispatcher.dispatch_status(status);
                }
                complete(ack, Ok(()));
            }
            Command::Reconnect { ack } => {
                if !self.state.is_running() {
                    self.start();
                }
                complete(ack, Ok(()));
            }
        }
    }

    fn subscribe(&mut self, request: SubscribeRequest) {
        let SubscribeRequest {
            channels,
            channel_groups,
            with_presence,
            state,
            timetoken,
        } = request;

        let channels_changed = self
            .set
            .add_channels(&channels, with_presence, state.as_ref());
        let groups_changed = self
            .set
            .add_channel_groups(&channel_groups, with_presence, state.as_ref());
        let changed = channels_changed || groups_changed;
        let running = self.state.is_running();

        if changed {
            self.connect_affected.0.extend(channels);
            self.connect_affected.1.extend(channel_groups);
            if running && !self.config.keep_timetoken_on_list_change {
                self.reset_cursor("list_change");
            }
        }
        if let Some(timetoken) = timetoken {
            self.cursor.override_start(timetoken);
            self.cursor_tx.send_replace(self.cursor.current());
        }
        self.publish_subscription();

        if !running {
            self.start();
        } else if changed || timetoken.is_some() || state.is_some() {
            if changed {
                self.retry.expect_connect();
            }
            self.restart(fields::REASON_RESTART);
        }
    }

    fn unsubscribe(&mut self, request: UnsubscribeRequest) {
        let removed = Removed {
            channels: self
                .set
                .remove_channels(&request.channels, request.with_presence),
            channel_groups: self
                .set
                .remove_channel_groups(&request.channel_groups, request.with_presence),
        };
        if removed.is_empty() {
            return;
        }

        self.publish_subscription();
        let (channels, channel_groups) = removed.leave_targets();
        self.announce_leave(channels, channel_groups, false);

        if self.set.is_empty() {
            self.finish_unsubscribe(removed);
            return;
        }

        let mut status = self.status(StatusCategory::Acknowledgment, Operation::Unsubscribe);
        status.affected_channels = removed.channels;
        status.affected_channel_groups = removed.channel_groups;
        self.dispatcher.dispatch_status(status);

        if self.state.is_running() {
            if !self.config.keep_timetoken_on_list_change {
                self.reset_cursor("list_change");
            }
            self.restart(fields::REASON_RESTART);
        }
    }

    /// The set is empty: stop the loop and start from "now" on the next subscribe.
    fn finish_unsubscribe(&mut self, removed: Removed) {
        self.stop_loop(fields::REASON_STOP);
        self.reset_cursor("unsubscribe_all");

        let mut status = self.status(StatusCategory::Disconnected, Operation::Unsubscribe);
        status.affected_channels = removed.channels;
        status.affected_channel_groups = removed.channel_groups;
        status.terminal = true;
        self.dispatcher.dispatch_status(status);
    }

    fn set_presence(&mut self, request: PresenceRequest) -> Result<(), SubscribeError> {
        if !self.config.manage_presence_list_manually {
            return Err(SubscribeError::configuration(
                "presence list is managed automatically; enable manage_presence_list_manually",
            ));
        }

        if request.connected {
            self.presence_list
                .add(&request.channels, &request.channel_groups);
        } else {
            let (channels, channel_groups) = self
                .presence_list
                .remove(&request.channels, &request.channel_groups);
            self.announce_leave(channels, channel_groups, true);
        }
        self.publish_targets();
        Ok(())
    }

    /// `explicit` leaves come from the manual presence API and ignore the manual-list rule.
    fn announce_leave(&self, channels: Vec<String>, channel_groups: Vec<String>, explicit: bool) {
        if self.config.suppress_leave_events {
            return;
        }
        if self.config.manage_presence_list_manually && !explicit {
            return;
        }
        self.leave.announce(channels, channel_groups);
    }

    fn start(&mut self) {
        if self.set.is_empty() {
            return;
        }
        self.retry.reset();
        self.backoff_until = None;
        self.set_state(EngineState::Starting);
        self.issue_poll();
    }

    fn restart(&mut self, reason: &str) {
        self.cancel_in_flight(reason);
        self.backoff_until = None;
        self.set_state(EngineState::Starting);
        self.issue_poll();
    }

    fn stop_loop(&mut self, reason: &str) {
        self.cancel_in_flight(reason);
        self.backoff_until = None;
        self.connect_affected = (Vec::new(), Vec::new());
        self.set_state(EngineState::Stopped);
    }

    fn cancel_in_flight(&mut self, reason: &str) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
            debug!(
                event = events::LONG_POLL_CANCELLED,
                component = COMPONENT,
                client = self.client.as_str(),
                generation = in_flight.generation,
                reason,
                "cancelled in-flight long-poll"
            );
        }
    }

    fn issue_poll(&mut self) {
        if self.set.is_empty() {
            self.set_state(EngineState::Stopped);
            return;
        }

        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let snapshot = self.current_snapshot();
        let request = Request {
            operation: Operation::Subscribe,
            user_id: self.config.user_id.clone(),
            channels: snapshot.subscribe_channels(),
            channel_groups: snapshot.subscribe_channel_groups(),
            cursor: self.cursor.current(),
            filter_expression: snapshot.filter_expression.clone(),
            state: snapshot.state_for(&snapshot.channels, &snapshot.channel_groups),
            heartbeat: (self.config.presence_heartbeat_value > 0)
                .then_some(self.config.presence_heartbeat_value),
            timeout: self.config.subscribe_max_idle(),
        };

        if tracing::enabled!(Level::DEBUG) {
            debug!(
                event = events::LONG_POLL_ISSUE,
                component = COMPONENT,
                client = self.client.as_str(),
                generation,
                channels = %fields::format_names(&request.channels),
                channel_groups = %fields::format_names(&request.channel_groups),
                cursor = %fields::format_cursor(request.cursor),
                "issuing long-poll"
            );
        }

        let transport = self.transport.clone();
        let results = self.poll_results_tx.clone();
        let task = tokio::spawn(async move {
            let result = transport.send(request).await;
            let _ = results.send(PollOutcome { generation, result });
        });

        self.in_flight = Some(InFlight { generation, task });
        self.set_state(EngineState::Waiting);
    }

    fn handle_outcome(&mut self, outcome: PollOutcome) -> Flow {
        let current = self.in_flight.as_ref().map(|in_flight| in_flight.generation);
        if current != Some(outcome.generation) {
            debug!(
                event = events::LONG_POLL_STALE_DISCARDED,
                component = COMPONENT,
                client = self.client.as_str(),
                generation = outcome.generation,
                "discarding result of a cancelled long-poll"
            );
            return Flow::Continue;
        }
        self.in_flight = None;

        match outcome.result {
            Err(err) => {
                self.handle_failure(FailureKind::from_transport_error(&err), err.to_string());
                Flow::Continue
            }
            Ok(response) if !response.is_success() => {
                let filter_in_effect = self.current_snapshot().filter_expression.is_some();
                let kind = FailureKind::from_http_status(response.status, filter_in_effect);
                self.handle_failure(
                    kind,
                    format!("status {}: {}", response.status, response.body_text()),
                );
                Flow::Continue
            }
            Ok(response) => {
                self.set_state(EngineState::Processing);
                match self.decoder.decode(&response) {
                    Ok(envelope) => self.process_envelope(envelope),
                    Err(err) => {
                        self.handle_failure(FailureKind::MalformedResponse, err.to_string());
                        Flow::Continue
                    }
                }
            }
        }
    }

    fn handle_failure(&mut self, kind: FailureKind, message: String) {
        let decision = self.retry.on_failure(kind);
        warn!(
            event = events::LONG_POLL_FAILED,
            component = COMPONENT,
            client = self.client.as_str(),
            kind = kind.as_str(),
            attempt = self.retry.attempt(),
            err = message.as_str(),
            "long-poll failed"
        );

        let reset_before_retry =
            kind.is_transient() && !self.config.catch_up_on_subscription_restore;

        match decision {
            RetryDecision::GiveUp => {
                let category = if kind == FailureKind::Network && !self.config.restore_subscription
                {
                    StatusCategory::UnexpectedDisconnect
                } else {
                    kind.category()
                };
                let mut status = self.status(category, Operation::Subscribe);
                status.is_error = true;
                status.terminal = true;
                status.message = Some(message);

                if kind == FailureKind::MalformedResponse {
                    self.reset_cursor("malformed_response");
                }
                self.stop_loop(fields::REASON_STOP);
                warn!(
                    event = events::LONG_POLL_GIVE_UP,
                    component = COMPONENT,
                    client = self.client.as_str(),
                    category = category.as_str(),
                    attempt = status.attempt,
                    "long-poll stopped after unrecoverable failure"
                );
                self.dispatcher.dispatch_status(status);
            }
            RetryDecision::RetryImmediately => {
                let mut status = self.status(kind.category(), Operation::Subscribe);
                status.message = Some(message);
                self.dispatcher.dispatch_status(status);

                if reset_before_retry {
                    self.reset_cursor("no_catch_up");
                }
                self.issue_poll();
            }
            RetryDecision::RetryAfter(delay) => {
                let mut status = self.status(kind.category(), Operation::Subscribe);
                status.message = Some(message);
                self.dispatcher.dispatch_status(status);

                if reset_before_retry {
                    self.reset_cursor("no_catch_up");
                }
                self.backoff_until = Some(Instant::now() + delay);
                self.set_state(EngineState::Backoff);
                info!(
                    event = events::LONG_POLL_BACKOFF,
                    component = COMPONENT,
                    client = self.client.as_str(),
                    attempt = self.retry.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    "retrying long-poll after backoff"
                );
            }
        }
    }

    fn process_envelope(&mut self, envelope: SubscribeEnvelope) -> Flow {
        let SubscribeEnvelope {
            cursor,
            events: batch,
        } = envelope;
        let received = batch.len();
        let cipher = self.cipher.clone();
        let mut accepted: Vec<(Event, Option<Status>)> = Vec::with_capacity(received);

        for mut event in batch {
            let fingerprint = event.fingerprint();
            let label = tracing::enabled!(Level::DEBUG)
                .then(|| fields::format_fingerprint(&fingerprint));
            if !self.dedup.should_deliver(fingerprint) {
                if let Some(label) = label {
                    debug!(
                        event = events::DEDUP_SUPPRESSED,
                        component = COMPONENT,
                        client = self.client.as_str(),
                        fingerprint = label.as_str(),
                        "suppressed redelivered event"
                    );
                }
                continue;
            }

            let mut decrypt_status = None;
            if let Some(cipher) = cipher.as_deref() {
                if let Err(err) = event.decrypt_with(cipher) {
                    warn!(
                        event = events::DECRYPT_FAILED,
                        component = COMPONENT,
                        client = self.client.as_str(),
                        channel = event.meta().channel.as_str(),
                        err = %err,
                        "delivering undecrypted payload"
                    );
                    let mut status = self.status(StatusCategory::DecryptionError, Operation::Subscribe);
                    status.affected_channels = vec![event.meta().channel.clone()];
                    status.message = Some(err.to_string());
                    decrypt_status = Some(status);
                }
            }
            accepted.push((event, decrypt_status));
        }

        if let Err(reason) = self.dedup.check_integrity() {
            error!(
                event = events::DEDUP_INTEGRITY_FAILED,
                component = COMPONENT,
                client = self.client.as_str(),
                reason = reason.as_str(),
                "dedup cache invariant violated"
            );
            let mut status = self.status(StatusCategory::Unknown, Operation::Subscribe);
            status.is_error = true;
            status.terminal = true;
            status.message = Some(reason.clone());
            self.stop_loop(fields::REASON_STOP);
            self.dispatcher.dispatch_status(status);
            self.fault_tx.send_replace(Some(reason));
            return Flow::Abort;
        }

        let previous = self.cursor.current();
        if self.cursor.advance(cursor) {
            if previous.map(|previous| previous.timetoken) != Some(cursor.timetoken) {
                self.last_timetoken = previous.map(|previous| previous.timetoken);
            }
            self.cursor_tx.send_replace(self.cursor.current());
            trace!(
                event = events::CURSOR_ADVANCED,
                component = COMPONENT,
                client = self.client.as_str(),
                cursor = %fields::format_cursor(Some(cursor)),
                "cursor advanced"
            );
        }

        if let Some(category) = self.retry.on_success() {
            let mut status = self.status(category, Operation::Subscribe);
            let (channels, channel_groups) = std::mem::take(&mut self.connect_affected);
            if channels.is_empty() && channel_groups.is_empty() {
                status.affected_channels = status.subscribed_channels.clone();
                status.affected_channel_groups = status.subscribed_channel_groups.clone();
            } else {
                status.affected_channels = channels;
                status.affected_channel_groups = channel_groups;
            }
            self.dispatcher.dispatch_status(status);
        }

        debug!(
            event = events::LONG_POLL_RESPONSE,
            component = COMPONENT,
            client = self.client.as_str(),
            received,
            accepted = accepted.len(),
            cursor = %fields::format_cursor(self.cursor.current()),
            "long-poll response processed"
        );

        for (event, decrypt_status) in accepted {
            if let Some(status) = decrypt_status {
                self.dispatcher.dispatch_status(status);
            }
            self.dispatcher.dispatch_event(event);
        }

        let threshold = self.config.request_message_count_threshold;
        if threshold > 0 && received >= threshold {
            info!(
                event = events::MESSAGE_COUNT_EXCEEDED,
                component = COMPONENT,
                client = self.client.as_str(),
                count = received,
                threshold,
                "long-poll batch reached the message count threshold"
            );
            let mut status = self.status(StatusCategory::MessageCountExceeded, Operation::Subscribe);
            status.message = Some(format!("{received} messages in one response"));
            self.dispatcher.dispatch_status(status);
        }

        self.issue_poll();
        Flow::Continue
    }

    fn status(&self, category: StatusCategory, operation: Operation) -> Status {
        let snapshot = self.current_snapshot();
        let mut status = Status::new(category, operation);
        status.subscribed_channels = snapshot.subscribe_channels();
        status.subscribed_channel_groups = snapshot.subscribe_channel_groups();
        status.current_timetoken = self.cursor.current().map(|cursor| cursor.timetoken);
        status.last_timetoken = self.last_timetoken;
        status.attempt = self.retry.attempt();
        status
    }

    fn reset_cursor(&mut self, reason: &str) {
        self.cursor.reset();
        self.cursor_tx.send_replace(None);
        debug!(
            event = events::CURSOR_RESET,
            component = COMPONENT,
            client = self.client.as_str(),
            reason,
            "cursor reset to now"
        );
    }

    fn set_state(&mut self, next: EngineState) {
        let previous = self.state;
        if previous == next {
            return;
        }
        self.state = next;
        self.state_tx.send_replace(next);
        trace!(
            event = events::ENGINE_STATE_CHANGE,
            component = COMPONENT,
            client = self.client.as_str(),
            from = previous.as_str(),
            to = next.as_str(),
            "engine state changed"
        );

        if previous.is_running() != next.is_running() {
            self.publish_targets();
        }
    }

    fn current_snapshot(&self) -> Arc<SubscriptionSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    fn publish_subscription(&mut self) {
        self.snapshot_tx.send_replace(Arc::new(self.set.snapshot()));
        self.publish_targets();
    }

    fn publish_targets(&self) {
        let snapshot = self.current_snapshot();
        let targets = if self.config.manage_presence_list_manually {
            let channels = self.presence_list.channels();
            let channel_groups = self.presence_list.channel_groups();
            HeartbeatTargets {
                state: snapshot.state_for(&channels, &channel_groups),
                channels,
                channel_groups,
            }
        } else if self.state.is_running() {
            HeartbeatTargets {
                channels: snapshot.channels.clone(),
                channel_groups: snapshot.channel_groups.clone(),
                state: snapshot.state_for(&snapshot.channels, &snapshot.channel_groups),
            }
        } else {
            HeartbeatTargets::default()
        };

        self.targets_tx.send_if_modified(|current| {
            if current.as_ref() == &targets {
                false
            } else {
                *current = Arc::new(targets);
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{DriverCollaborators, LongPollDriver};
    use crate::config::SubscriberConfig;
    use crate::dispatch::dispatcher::EventDispatcher;
    use crate::dispatch::listener::SubscribeListener;
    use crate::engine::command::Command;
    use crate::event::{Event, EventMeta, MessageEvent, Status, StatusCategory};
    use crate::request::SubscribeRequest;
    use crate::state::cursor::{Cursor, Timetoken};
    use crate::state::dedup_cache::Fingerprint;
    use crate::transport::{
        DecodeError, Decoder, Request, Response, SubscribeEnvelope, Transport, TransportError,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::runtime::Handle;
    use tokio::sync::{oneshot, Notify};

    /// Answers the first long-poll and holds every later one open.
    #[derive(Default)]
    struct SingleReply {
        answered: AtomicBool,
    }

    #[async_trait]
    impl Transport for SingleReply {
        async fn send(&self, _request: Request) -> Result<Response, TransportError> {
            if self.answered.swap(true, Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            Ok(Response::new(200, "{}"))
        }
    }

    struct OneMessage;

    impl Decoder for OneMessage {
        fn decode(&self, _response: &Response) -> Result<SubscribeEnvelope, DecodeError> {
            Ok(SubscribeEnvelope {
                cursor: Cursor::new(10, None),
                events: vec![Event::Message(MessageEvent {
                    meta: EventMeta {
                        channel: "room1".to_string(),
                        timetoken: Timetoken(10),
                        ..Default::default()
                    },
                    payload: json!("hello"),
                    ..Default::default()
                })],
            })
        }
    }

    #[derive(Default)]
    struct Collector {
        statuses: Mutex<Vec<Status>>,
        messages: Mutex<Vec<MessageEvent>>,
        notify: Notify,
    }

    #[async_trait]
    impl SubscribeListener for Collector {
        async fn on_message(&self, message: MessageEvent) {
            self.messages.lock().expect("collector lock").push(message);
        }

        async fn on_status(&self, status: Status) {
            self.statuses.lock().expect("collector lock").push(status);
            self.notify.notify_one();
        }
    }

    #[tokio::test]
    async fn broken_dedup_invariant_aborts_driver_with_terminal_status() {
        let collector = Arc::new(Collector::default());
        let dispatcher = Arc::new(EventDispatcher::new("test", Handle::current(), 16));
        dispatcher.add_listener(collector.clone());

        let config = SubscriberConfig {
            user_id: "tester".to_string(),
            ..Default::default()
        }
        .validated()
        .expect("config should validate");
        let (mut driver, channels) = LongPollDriver::new(
            "test",
            Arc::new(config),
            DriverCollaborators {
                transport: Arc::new(SingleReply::default()),
                decoder: Arc::new(OneMessage),
                cipher: None,
                dispatcher,
            },
        );
        driver
            .dedup
            .insert_unindexed(Fingerprint::new("room0", Timetoken(1), &json!("stale")));
        let task = driver.spawn(&Handle::current());

        let (ack, done) = oneshot::channel();
        channels
            .commands
            .send(Command::Subscribe {
                request: SubscribeRequest::channels(["room1"]),
                ack,
            })
            .expect("driver should accept commands");
        assert_eq!(done.await.expect("driver should acknowledge"), Ok(()));

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("driver should exit")
            .expect("driver task should not panic");

        let statuses = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = collector.notify.notified();
                let statuses = collector.statuses.lock().expect("collector lock").clone();
                if !statuses.is_empty() {
                    return statuses;
                }
                notified.await;
            }
        })
        .await
        .expect("terminal status should be delivered");

        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].category, StatusCategory::Unknown);
        assert!(statuses[0].terminal);
        assert!(statuses[0].is_error);
        assert!(collector.messages.lock().expect("collector lock").is_empty());
        assert!(channels.fault.borrow().is_some());

        let (ack, _done) = oneshot::channel();
        assert!(channels
            .commands
            .send(Command::Reconnect { ack })
            .is_err());
    }
}
