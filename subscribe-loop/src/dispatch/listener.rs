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

//! Listener contract and pointer-identity keying for registered listeners.

use crate::event::{MessageActionEvent, MessageEvent, ObjectEvent, PresenceEvent, Status};
use async_trait::async_trait;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Receives events and statuses from the subscribe loop.
///
/// Every method has a no-op default so listeners implement only what they consume.
/// Calls for one listener are serialized and arrive in delivery order.
#[async_trait]
pub trait SubscribeListener: Send + Sync {
    async fn on_message(&self, _message: MessageEvent) {}

    async fn on_signal(&self, _signal: MessageEvent) {}

    async fn on_presence(&self, _presence: PresenceEvent) {}

    /// Uuid and channel metadata events.
    async fn on_object(&self, _object: ObjectEvent) {}

    async fn on_membership(&self, _membership: ObjectEvent) {}

    async fn on_message_action(&self, _action: MessageActionEvent) {}

    async fn on_status(&self, _status: Status) {}
}

/// Identity of a registered listener, by allocation rather than by value.
#[derive(Clone)]
pub(crate) struct ListenerIdentityKey {
    listener: Arc<dyn SubscribeListener>,
}

impl ListenerIdentityKey {
    pub(crate) fn new(listener: Arc<dyn SubscribeListener>) -> Self {
        Self { listener }
    }

    fn address(&self) -> *const () {
        Arc::as_ptr(&self.listener) as *const ()
    }
}

impl Hash for ListenerIdentityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

// Compare the data pointer only; vtable pointers differ across codegen units.
impl PartialEq for ListenerIdentityKey {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.address(), other.address())
    }
}

impl Eq for ListenerIdentityKey {}

impl Debug for ListenerIdentityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerIdentityKey")
            .field("address", &self.address())
            .finish()
    }
}
