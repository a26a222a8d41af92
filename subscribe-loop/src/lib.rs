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

//! # subscribe-loop
//!
//! `subscribe-loop` is the long-poll subscribe engine of a publish/subscribe client. It keeps a
//! continuous read position across a changing set of channels and channel groups, survives
//! network failures with backoff, suppresses redelivered events and fans decoded events out to
//! listeners in server order.
//!
//! The network and wire format are collaborators: callers provide a [`Transport`], a
//! [`Decoder`] and optionally a [`Cipher`]. `subscribe-http` provides implementations for the
//! hosted REST service.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use subscribe_loop::{
//!     DecodeError, Decoder, Request, Response, SubscribeEnvelope, SubscribeRequest, Subscriber,
//!     SubscriberConfig, Transport, TransportError, UnsubscribeRequest,
//! };
//!
//! struct IdleTransport;
//!
//! #[async_trait]
//! impl Transport for IdleTransport {
//!     async fn send(&self, _request: Request) -> Result<Response, TransportError> {
//!         std::future::pending().await
//!     }
//! }
//!
//! struct EmptyDecoder;
//!
//! impl Decoder for EmptyDecoder {
//!     fn decode(&self, _response: &Response) -> Result<SubscribeEnvelope, DecodeError> {
//!         Ok(SubscribeEnvelope::default())
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let subscriber = Subscriber::new(
//!     "quick-start",
//!     SubscriberConfig::default(),
//!     Arc::new(IdleTransport),
//!     Arc::new(EmptyDecoder),
//!     None,
//! )
//! .unwrap();
//!
//! subscriber
//!     .subscribe(SubscribeRequest::channels(["room1"]).with_presence())
//!     .await
//!     .unwrap();
//! assert!(subscriber.is_subscribed("room1-pnpres"));
//! assert!(subscriber.engine_state().is_running());
//!
//! subscriber
//!     .unsubscribe(UnsubscribeRequest::channels(["room1"]))
//!     .await
//!     .unwrap();
//! assert!(subscriber.channels().is_empty());
//! assert!(!subscriber.engine_state().is_running());
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - API facade: [`Subscriber`] and the request types
//! - State: subscription set, cursor and dedup cache, owned by the driver task
//! - Engine: long-poll driver, retry/backoff controller, heartbeat and leave tasks
//! - Dispatch: listener registry with one delivery worker per listener
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events.
//! Library code emits events and does not initialize a global subscriber. Binaries and tests
//! are responsible for one-time `tracing_subscriber` initialization at process boundaries.
//! Recoverable conditions reach the application as [`Status`] notifications, never as errors.

mod config;
pub use config::{HeartbeatNotifications, RetryConfig, SubscriberConfig};

mod dispatch;
pub use dispatch::listener::SubscribeListener;

mod engine;
pub use engine::EngineState;

mod error;
pub use error::SubscribeError;

mod event;
pub use event::{
    Event, EventKind, EventMeta, MessageActionEvent, MessageEvent, ObjectEntity, ObjectEvent,
    PresenceAction, PresenceEvent, Status, StatusCategory,
};

#[doc(hidden)]
pub mod observability;

mod request;
pub use request::{PresenceRequest, SubscribeRequest, UnsubscribeRequest};

mod state;
pub use state::cursor::{Cursor, Timetoken, TIMETOKEN_UNITS_PER_SECOND};
pub use state::dedup_cache::{DedupCache, Fingerprint};
pub use state::subscription_set::{
    is_presence_name, presence_name, ClientState, SubscriptionSnapshot, PRESENCE_SUFFIX,
};

mod subscriber;
pub use subscriber::Subscriber;

mod transport;
pub use transport::{
    Cipher, DecodeError, Decoder, DecryptError, Operation, Request, Response, SubscribeEnvelope,
    Transport, TransportError,
};
