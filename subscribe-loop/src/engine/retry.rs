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

//! Failure classification and the retry/backoff decision for the long-poll.

use crate::config::{RetryConfig, SubscriberConfig};
use crate::event::StatusCategory;
use crate::transport::TransportError;
use rand::Rng;
use std::time::Duration;

/// Why a long-poll attempt failed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum FailureKind {
    /// DNS, TLS, refused or reset connections.
    Network,
    /// The client gave up waiting before the server answered.
    ClientTimeout,
    /// 5xx answer.
    ServerError,
    /// The transport abandoned the request on its own, e.g. a closing connection pool.
    Cancelled,
    /// Undecodable body or unexpected shape.
    MalformedResponse,
    AccessDenied,
    BadRequest,
    MalformedFilterExpression,
    RequestUriTooLong,
}

impl FailureKind {
    /// Classifies a non-success HTTP status.
    pub(crate) fn from_http_status(status: u16, filter_in_effect: bool) -> Self {
        match status {
            403 => FailureKind::AccessDenied,
            414 => FailureKind::RequestUriTooLong,
            400 if filter_in_effect => FailureKind::MalformedFilterExpression,
            400..=499 => FailureKind::BadRequest,
            500..=599 => FailureKind::ServerError,
            _ => FailureKind::MalformedResponse,
        }
    }

    /// Cancellations issued by the driver abort the poll task and never produce a result,
    /// so a `Cancelled` seen here came from the transport itself.
    pub(crate) fn from_transport_error(error: &TransportError) -> Self {
        match error {
            TransportError::Cancelled => FailureKind::Cancelled,
            TransportError::Timeout => FailureKind::ClientTimeout,
            TransportError::Dns(_)
            | TransportError::Tls(_)
            | TransportError::ConnectionRefused(_)
            | TransportError::ConnectionReset(_)
            | TransportError::Other(_) => FailureKind::Network,
        }
    }

    pub(crate) fn category(&self) -> StatusCategory {
        match self {
            FailureKind::Network => StatusCategory::NetworkIssues,
            FailureKind::ClientTimeout => StatusCategory::Timeout,
            FailureKind::ServerError => StatusCategory::UnexpectedDisconnect,
            FailureKind::Cancelled => StatusCategory::Cancelled,
            FailureKind::MalformedResponse => StatusCategory::MalformedResponse,
            FailureKind::AccessDenied => StatusCategory::AccessDenied,
            FailureKind::BadRequest => StatusCategory::BadRequest,
            FailureKind::MalformedFilterExpression => StatusCategory::MalformedFilterExpression,
            FailureKind::RequestUriTooLong => StatusCategory::RequestUriTooLong,
        }
    }

    pub(crate) fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureKind::Network
                | FailureKind::ClientTimeout
                | FailureKind::ServerError
                | FailureKind::Cancelled
        )
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::ClientTimeout => "client_timeout",
            FailureKind::ServerError => "server_error",
            FailureKind::Cancelled => "cancelled",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::AccessDenied => "access_denied",
            FailureKind::BadRequest => "bad_request",
            FailureKind::MalformedFilterExpression => "malformed_filter_expression",
            FailureKind::RequestUriTooLong => "request_uri_too_long",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum RetryDecision {
    RetryImmediately,
    RetryAfter(Duration),
    GiveUp,
}

/// Static retry settings taken from the subscriber configuration.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RetryPolicy {
    pub(crate) initial_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) jitter: f64,
    pub(crate) max_malformed_retries: u32,
    pub(crate) max_network_retries: Option<u32>,
    /// When `false`, network failures stop the loop instead of retrying.
    pub(crate) restore_subscription: bool,
}

impl RetryPolicy {
    pub(crate) fn from_config(config: &SubscriberConfig) -> Self {
        let RetryConfig {
            initial_delay_ms,
            max_delay_ms,
            jitter,
            max_malformed_retries,
            max_network_retries,
        } = config.retry.clone();

        Self {
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            jitter,
            max_malformed_retries,
            max_network_retries,
            restore_subscription: config.restore_subscription,
        }
    }

    /// `min(initial * 2^(attempt - 1), max)` scaled by a factor in `[1 - jitter, 1 + jitter]`,
    /// never above `max`.
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        if self.jitter <= 0.0 {
            return delay;
        }

        let factor = rand::thread_rng().gen_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        delay.mul_f64(factor).min(self.max_delay)
    }
}

/// Attempt bookkeeping for the current cursor position.
#[derive(Debug)]
pub(crate) struct RetryController {
    policy: RetryPolicy,
    attempt: u32,
    malformed_attempts: u32,
    connect_pending: bool,
}

impl RetryController {
    pub(crate) fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            malformed_attempts: 0,
            connect_pending: false,
        }
    }

    /// Consecutive failures since the last success.
    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Forgets failure history; the next success reports `Connected`.
    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
        self.malformed_attempts = 0;
        self.connect_pending = true;
    }

    /// Marks that the next success should announce a connection for a new composition.
    pub(crate) fn expect_connect(&mut self) {
        self.connect_pending = true;
    }

    pub(crate) fn on_failure(&mut self, kind: FailureKind) -> RetryDecision {
        self.attempt = self.attempt.saturating_add(1);

        match kind {
            FailureKind::AccessDenied
            | FailureKind::BadRequest
            | FailureKind::MalformedFilterExpression
            | FailureKind::RequestUriTooLong => RetryDecision::GiveUp,
            FailureKind::MalformedResponse => {
                self.malformed_attempts = self.malformed_attempts.saturating_add(1);
                if self.malformed_attempts > self.policy.max_malformed_retries {
                    RetryDecision::GiveUp
                } else {
                    RetryDecision::RetryAfter(self.policy.backoff(self.malformed_attempts))
                }
            }
            FailureKind::Network
            | FailureKind::ClientTimeout
            | FailureKind::ServerError
            | FailureKind::Cancelled => {
                if kind == FailureKind::Network && !self.policy.restore_subscription {
                    return RetryDecision::GiveUp;
                }
                if let Some(limit) = self.policy.max_network_retries {
                    if self.attempt > limit {
                        return RetryDecision::GiveUp;
                    }
                }
                if kind == FailureKind::ClientTimeout && self.attempt == 1 {
                    return RetryDecision::RetryImmediately;
                }
                RetryDecision::RetryAfter(self.policy.backoff(self.attempt))
            }
        }
    }

    /// Records a successful response and returns the lifecycle status it completes, if any.
    pub(crate) fn on_success(&mut self) -> Option<StatusCategory> {
        let category = if self.attempt > 0 {
            Some(StatusCategory::Reconnected)
        } else if self.connect_pending {
            Some(StatusCategory::Connected)
        } else {
            None
        };

        self.attempt = 0;
        self.malformed_attempts = 0;
        self.connect_pending = false;
        category
    }
}
