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

//! Fan-out of events and statuses to registered listeners.

use crate::dispatch::listener::{ListenerIdentityKey, SubscribeListener};
use crate::dispatch::listener_worker::{Delivery, Enqueued, ListenerWorker};
use crate::event::{Event, Status};
use crate::observability::events;
use std::sync::{Arc, RwLock};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

const COMPONENT: &str = "event_dispatcher";

struct ListenerSlot {
    key: ListenerIdentityKey,
    worker: ListenerWorker,
}

/// Registration-ordered listener registry with copy-on-write snapshots.
///
/// The lock is held only to swap the slot list, never while delivering.
pub(crate) struct EventDispatcher {
    client: String,
    runtime: Handle,
    queue_capacity: usize,
    slots: RwLock<Arc<Vec<Arc<ListenerSlot>>>>,
}

impl EventDispatcher {
    pub(crate) fn new(client: impl Into<String>, runtime: Handle, queue_capacity: usize) -> Self {
        Self {
            client: client.into(),
            runtime,
            queue_capacity,
            slots: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Registers `listener`. Returns `false` if the same allocation is already registered.
    pub(crate) fn add_listener(&self, listener: Arc<dyn SubscribeListener>) -> bool {
        let key = ListenerIdentityKey::new(listener.clone());
        let mut slots = match self.slots.write() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };

        if slots.iter().any(|slot| slot.key == key) {
            debug!(
                event = events::LISTENER_ADD_DUPLICATE,
                component = COMPONENT,
                client = self.client.as_str(),
                "listener already registered"
            );
            return false;
        }

        let worker = ListenerWorker::spawn(
            &self.runtime,
            &self.client,
            listener,
            self.queue_capacity,
        );
        info!(
            event = events::LISTENER_ADD,
            component = COMPONENT,
            client = self.client.as_str(),
            worker_id = worker.worker_id(),
            "listener registered"
        );

        let mut next = slots.as_ref().clone();
        next.push(Arc::new(ListenerSlot { key, worker }));
        *slots = Arc::new(next);
        true
    }

    /// Unregisters by identity. Items already queued for the listener are still delivered.
    pub(crate) fn remove_listener(&self, listener: &Arc<dyn SubscribeListener>) -> bool {
        let key = ListenerIdentityKey::new(listener.clone());
        let mut slots = match self.slots.write() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };

        let Some(position) = slots.iter().position(|slot| slot.key == key) else {
            return false;
        };

        let mut next = slots.as_ref().clone();
        let removed = next.remove(position);
        *slots = Arc::new(next);

        info!(
            event = events::LISTENER_REMOVE,
            component = COMPONENT,
            client = self.client.as_str(),
            worker_id = removed.worker.worker_id(),
            "listener removed"
        );
        true
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.snapshot().len()
    }

    pub(crate) fn dispatch_event(&self, event: Event) {
        self.fan_out(Delivery::Event(Arc::new(event)));
    }

    pub(crate) fn dispatch_status(&self, status: Status) {
        self.fan_out(Delivery::Status(Arc::new(status)));
    }

    fn snapshot(&self) -> Arc<Vec<Arc<ListenerSlot>>> {
        match self.slots.read() {
            Ok(slots) => slots.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn fan_out(&self, delivery: Delivery) {
        for slot in self.snapshot().iter() {
            match slot.worker.enqueue(delivery.clone()) {
                Enqueued::Queued => {}
                Enqueued::Full => warn!(
                    event = events::LISTENER_QUEUE_FULL,
                    component = COMPONENT,
                    client = self.client.as_str(),
                    worker_id = slot.worker.worker_id(),
                    kind = delivery.label(),
                    dropped = slot.worker.dropped(),
                    capacity = self.queue_capacity,
                    "listener queue full; dropping delivery"
                ),
                Enqueued::Closed => warn!(
                    event = events::LISTENER_QUEUE_CLOSED,
                    component = COMPONENT,
                    client = self.client.as_str(),
                    worker_id = slot.worker.worker_id(),
                    "listener worker is gone; dropping delivery"
                ),
            }
        }
    }
}
