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

//! Application-facing error type.
//!
//! Recoverable loop conditions are never returned from here: they are reported to
//! listeners as [`Status`](crate::Status) events instead.

use thiserror::Error;

/// Problem while applying an application request to the subscriber.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SubscribeError {
    /// Invalid configuration or request contents (empty names, empty request, bad timings).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The driver task has exited and can no longer accept requests.
    #[error("subscriber is closed")]
    ClientClosed,

    /// The driver stopped because an internal invariant did not hold. Returned by every
    /// call made after that point.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SubscribeError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        SubscribeError::Configuration(message.into())
    }
}
