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

//! Per-listener delivery worker.

use crate::dispatch::listener::SubscribeListener;
use crate::event::{Event, ObjectEntity, Status};
use crate::observability::events;
use crate::observability::fields::{self, WorkerContext};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, info, Level};

const COMPONENT: &str = "listener_worker";

/// Item queued for a single listener.
#[derive(Clone, Debug)]
pub(crate) enum Delivery {
    Event(Arc<Event>),
    Status(Arc<Status>),
}

impl Delivery {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Delivery::Event(event) => event.kind().as_str(),
            Delivery::Status(status) => status.category.as_str(),
        }
    }
}

/// Result of handing a delivery to a worker.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Enqueued {
    Queued,
    /// The listener is behind by a full queue; the delivery was dropped.
    Full,
    Closed,
}

/// Owns the bounded queue feeding one listener and the task draining it.
///
/// Dropping the worker closes the queue; the task finishes what was already queued
/// and exits.
pub(crate) struct ListenerWorker {
    worker_id: String,
    sender: Sender<Delivery>,
    dropped: AtomicU64,
    _task: JoinHandle<()>,
}

impl ListenerWorker {
    pub(crate) fn spawn(
        runtime: &Handle,
        client: &str,
        listener: Arc<dyn SubscribeListener>,
        capacity: usize,
    ) -> Self {
        let worker_id = uuid::Uuid::new_v4().hyphenated().to_string();
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let context = WorkerContext::new(client, worker_id.clone());
        let task = runtime.spawn(Self::delivery_loop(context, listener, receiver));

        Self {
            worker_id,
            sender,
            dropped: AtomicU64::new(0),
            _task: task,
        }
    }

    pub(crate) fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Queues an item without waiting for the listener.
    pub(crate) fn enqueue(&self, delivery: Delivery) -> Enqueued {
        match self.sender.try_send(delivery) {
            Ok(()) => Enqueued::Queued,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Enqueued::Full
            }
            Err(TrySendError::Closed(_)) => Enqueued::Closed,
        }
    }

    /// Deliveries dropped so far because the queue was full.
    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drains the queue into the listener one item at a time, preserving order.
    pub(crate) async fn delivery_loop(
        context: WorkerContext,
        listener: Arc<dyn SubscribeListener>,
        mut receiver: Receiver<Delivery>,
    ) {
        while let Some(delivery) = receiver.recv().await {
            if tracing::enabled!(Level::TRACE) {
                tracing::trace!(
                    event = events::LISTENER_DELIVER,
                    component = COMPONENT,
                    client = context.client.as_str(),
                    worker_id = context.worker_id.as_str(),
                    kind = delivery.label(),
                    "delivering to listener"
                );
            }

            match delivery {
                Delivery::Event(event) => Self::deliver_event(listener.as_ref(), &event).await,
                Delivery::Status(status) => listener.on_status(status.as_ref().clone()).await,
            }
        }

        info!(
            event = events::LISTENER_WORKER_STOP,
            component = COMPONENT,
            client = context.client.as_str(),
            worker_id = context.worker_id.as_str(),
            reason = fields::REASON_QUEUE_CLOSED,
            "listener queue closed; stopping worker"
        );
    }

    async fn deliver_event(listener: &dyn SubscribeListener, event: &Event) {
        match event {
            Event::Message(message) => listener.on_message(message.clone()).await,
            Event::Signal(signal) => listener.on_signal(signal.clone()).await,
            Event::Presence(presence) => listener.on_presence(presence.clone()).await,
            Event::Object(object) if object.entity == ObjectEntity::Membership => {
                listener.on_membership(object.clone()).await
            }
            Event::Object(object) => listener.on_object(object.clone()).await,
            Event::MessageAction(action) => listener.on_message_action(action.clone()).await,
        }
    }
}

impl Drop for ListenerWorker {
    fn drop(&mut self) {
        debug!(
            event = events::LISTENER_QUEUE_CLOSED,
            component = COMPONENT,
            worker_id = self.worker_id.as_str(),
            "closing listener queue"
        );
    }
}
