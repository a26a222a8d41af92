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

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use subscribe_loop::{Operation, Request, Response, Transport, TransportError};
use tokio::sync::{oneshot, Notify};
use tracing::debug;

/// Scripted answer for one subscribe request.
pub enum ScriptedReply {
    Respond(Response),
    Fail(TransportError),
    /// Completed later through the paired [`HeldReply`].
    Hold(oneshot::Receiver<Result<Response, TransportError>>),
}

/// Completes a held subscribe request.
pub struct HeldReply {
    sender: oneshot::Sender<Result<Response, TransportError>>,
}

impl HeldReply {
    /// Returns `false` if the request was already cancelled by the subscriber.
    pub fn complete(self, result: Result<Response, TransportError>) -> bool {
        self.sender.send(result).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.sender.is_closed()
    }
}

#[derive(Default)]
struct TransportState {
    requests: Vec<Request>,
    subscribe_replies: VecDeque<ScriptedReply>,
    presence_replies: VecDeque<Result<Response, TransportError>>,
}

/// In-memory transport answering requests from scripted queues.
///
/// Subscribe requests with no scripted reply stay pending, like an idle long-poll.
/// Heartbeat and leave requests answer `200` unless a presence reply is queued.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<TransportState>>,
    request_arrived: Arc<Notify>,
    cancelled: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, reply: ScriptedReply) {
        self.lock().subscribe_replies.push_back(reply);
    }

    pub fn push_response(&self, response: Response) {
        self.push_reply(ScriptedReply::Respond(response));
    }

    pub fn push_status(&self, status: u16, body: &str) {
        self.push_response(Response::new(status, Bytes::from(body.to_string())));
    }

    pub fn push_failure(&self, error: TransportError) {
        self.push_reply(ScriptedReply::Fail(error));
    }

    /// Queues a subscribe reply that only completes when the returned handle is used.
    pub fn push_held(&self) -> HeldReply {
        let (sender, receiver) = oneshot::channel();
        self.push_reply(ScriptedReply::Hold(receiver));
        HeldReply { sender }
    }

    pub fn push_presence_reply(&self, reply: Result<Response, TransportError>) {
        self.lock().presence_replies.push_back(reply);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    pub fn requests_for(&self, operation: Operation) -> Vec<Request> {
        self.lock()
            .requests
            .iter()
            .filter(|request| request.operation == operation)
            .cloned()
            .collect()
    }

    pub fn subscribe_requests(&self) -> Vec<Request> {
        self.requests_for(Operation::Subscribe)
    }

    /// Number of `send` futures dropped before they produced a result.
    pub fn cancelled_count(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` requests of `operation` were sent.
    pub async fn wait_for_requests(&self, operation: Operation, count: usize) -> Vec<Request> {
        let waited = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let notified = self.request_arrived.notified();
                let requests = self.requests_for(operation);
                if requests.len() >= count {
                    return requests;
                }
                notified.await;
            }
        })
        .await;

        match waited {
            Ok(requests) => requests,
            Err(_) => panic!(
                "timed out waiting for {count} {} requests; saw {}",
                operation.as_str(),
                self.requests_for(operation).len()
            ),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TransportState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Counts the enclosing `send` as cancelled unless disarmed.
struct CancelGuard {
    counter: Arc<AtomicUsize>,
    armed: bool,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            self.counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let operation = request.operation;
        let reply = {
            let mut state = self.lock();
            state.requests.push(request);
            match operation {
                Operation::Subscribe => state.subscribe_replies.pop_front(),
                Operation::Heartbeat | Operation::Leave | Operation::Unsubscribe => Some(
                    ScriptedReply::from(state.presence_replies.pop_front().unwrap_or_else(|| {
                        Ok(Response::new(200, Bytes::from_static(br#"{"status":200}"#)))
                    })),
                ),
            }
        };
        self.request_arrived.notify_waiters();
        debug!(operation = operation.as_str(), "scripted transport received request");

        let mut guard = CancelGuard {
            counter: self.cancelled.clone(),
            armed: true,
        };
        let result = match reply {
            Some(ScriptedReply::Respond(response)) => Ok(response),
            Some(ScriptedReply::Fail(error)) => Err(error),
            Some(ScriptedReply::Hold(receiver)) => match receiver.await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Cancelled),
            },
            None => std::future::pending().await,
        };
        guard.armed = false;
        result
    }
}

impl From<Result<Response, TransportError>> for ScriptedReply {
    fn from(result: Result<Response, TransportError>) -> Self {
        match result {
            Ok(response) => ScriptedReply::Respond(response),
            Err(error) => ScriptedReply::Fail(error),
        }
    }
}
