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

mod support;

use async_trait::async_trait;
use integration_test_utils::{
    channel_names, handshake_response, message_entry, subscribe_response, RecordingListener,
    TEST_REGION,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use subscribe_http::JsonDecoder;
use subscribe_loop::{
    Cursor, EngineState, Operation, Request, Response, StatusCategory, SubscribeRequest,
    Subscriber, SubscriberConfig, Timetoken, Transport, TransportError,
};
use support::{make_harness, settle, test_config, wait_until_cancelled};

/// Transport whose every request is abandoned by the client library underneath.
#[derive(Default)]
struct AbandoningTransport {
    sent: AtomicUsize,
}

#[async_trait]
impl Transport for AbandoningTransport {
    async fn send(&self, _request: Request) -> Result<Response, TransportError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Cancelled)
    }
}

#[tokio::test]
async fn message_is_delivered_and_cursor_is_carried_forward() {
    let harness = make_harness(test_config());
    harness.transport.push_response(subscribe_response(
        100,
        vec![message_entry("room1", 100, json!({"text": "hello"}))],
    ));

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");

    let messages = harness.listener.wait_for_messages(1).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].meta.channel, "room1");
    assert_eq!(messages[0].meta.timetoken, Timetoken(100));
    assert_eq!(messages[0].payload, json!({"text": "hello"}));

    let requests = harness
        .transport
        .wait_for_requests(Operation::Subscribe, 2)
        .await;
    assert_eq!(requests[0].cursor, None);
    assert_eq!(requests[0].channels, channel_names(&["room1"]));
    assert_eq!(requests[1].cursor, Some(Cursor::new(100, Some(TEST_REGION))));

    let connected = harness
        .listener
        .wait_for_status(StatusCategory::Connected)
        .await;
    assert_eq!(connected.affected_channels, channel_names(&["room1"]));
    assert!(!connected.is_error);
    assert_eq!(harness.subscriber.engine_state(), EngineState::Waiting);
}

#[tokio::test]
async fn network_failures_recover_with_reconnected_status() {
    let harness = make_harness(test_config());
    for _ in 0..3 {
        harness
            .transport
            .push_failure(TransportError::ConnectionRefused("refused".to_string()));
    }
    harness.transport.push_response(handshake_response(200));

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");

    let reconnected = harness
        .listener
        .wait_for_status(StatusCategory::Reconnected)
        .await;
    assert_eq!(reconnected.attempt, 0);

    let statuses = harness.listener.statuses();
    assert_eq!(
        harness.listener.status_categories(),
        vec![
            StatusCategory::NetworkIssues,
            StatusCategory::NetworkIssues,
            StatusCategory::NetworkIssues,
            StatusCategory::Reconnected,
        ]
    );
    assert!(statuses.iter().all(|status| !status.terminal));
    assert_eq!(
        statuses[..3]
            .iter()
            .map(|status| status.attempt)
            .collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    let requests = harness
        .transport
        .wait_for_requests(Operation::Subscribe, 5)
        .await;
    assert_eq!(requests[4].cursor, Some(Cursor::new(200, Some(TEST_REGION))));
}

#[tokio::test]
async fn access_denied_is_terminal_until_resubscribe() {
    let harness = make_harness(test_config());
    harness.transport.push_status(403, r#"{"status":403,"error":true}"#);

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");

    let denied = harness
        .listener
        .wait_for_status(StatusCategory::AccessDenied)
        .await;
    assert!(denied.terminal);
    assert!(denied.is_error);

    settle().await;
    assert_eq!(harness.transport.subscribe_requests().len(), 1);
    assert_eq!(
        harness.listener.status_categories(),
        vec![StatusCategory::AccessDenied]
    );
    assert_eq!(harness.subscriber.engine_state(), EngineState::Stopped);
    assert!(harness.subscriber.is_subscribed("room1"));

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room2"]))
        .await
        .expect("resubscribe should be accepted");

    let requests = harness
        .transport
        .wait_for_requests(Operation::Subscribe, 2)
        .await;
    assert_eq!(requests[1].channels, channel_names(&["room1", "room2"]));
}

#[tokio::test]
async fn bad_request_with_filter_reports_malformed_filter() {
    let harness = make_harness(test_config());
    harness.transport.push_status(400, r#"{"status":400}"#);

    harness
        .subscriber
        .set_filter_expression(Some("uuid == 'x".to_string()))
        .await
        .expect("filter should be accepted");
    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");

    let status = harness
        .listener
        .wait_for_status(StatusCategory::MalformedFilterExpression)
        .await;
    assert!(status.terminal);
    assert_eq!(
        harness.transport.subscribe_requests()[0]
            .filter_expression
            .as_deref(),
        Some("uuid == 'x")
    );
}

#[tokio::test]
async fn server_errors_are_retried() {
    let harness = make_harness(test_config());
    harness.transport.push_status(503, "unavailable");
    harness.transport.push_response(handshake_response(10));

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");

    harness
        .listener
        .wait_for_status(StatusCategory::Reconnected)
        .await;
    assert_eq!(
        harness.listener.status_categories(),
        vec![
            StatusCategory::UnexpectedDisconnect,
            StatusCategory::Reconnected
        ]
    );
}

#[tokio::test]
async fn first_client_timeout_is_retried_immediately() {
    let harness = make_harness(test_config());
    harness.transport.push_failure(TransportError::Timeout);
    harness.transport.push_response(handshake_response(10));

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");

    harness
        .listener
        .wait_for_status(StatusCategory::Reconnected)
        .await;
    assert_eq!(
        harness.listener.status_categories()[0],
        StatusCategory::Timeout
    );
}

#[tokio::test]
async fn network_failure_without_restore_is_unexpected_disconnect() {
    let config = subscribe_loop::SubscriberConfig {
        restore_subscription: false,
        ..test_config()
    };
    let harness = make_harness(config);
    harness
        .transport
        .push_failure(TransportError::Dns("no such host".to_string()));

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");

    let status = harness
        .listener
        .wait_for_status(StatusCategory::UnexpectedDisconnect)
        .await;
    assert!(status.terminal);
    settle().await;
    assert_eq!(harness.transport.subscribe_requests().len(), 1);
}

#[tokio::test]
async fn malformed_responses_are_bounded_then_terminal() {
    let config = subscribe_loop::SubscriberConfig {
        retry: subscribe_loop::RetryConfig {
            max_malformed_retries: 2,
            ..test_config().retry
        },
        ..test_config()
    };
    let harness = make_harness(config);
    harness
        .transport
        .push_response(subscribe_response(50, Vec::new()));
    for _ in 0..3 {
        harness.transport.push_status(200, "<html>captive portal</html>");
    }

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");

    harness
        .listener
        .wait_until("terminal malformed response", |recorded| {
            recorded.iter().any(|entry| {
                matches!(
                    entry,
                    integration_test_utils::Recorded::Status(status)
                        if status.category == StatusCategory::MalformedResponse && status.terminal
                )
            })
        })
        .await;

    let malformed: Vec<_> = harness
        .listener
        .statuses()
        .into_iter()
        .filter(|status| status.category == StatusCategory::MalformedResponse)
        .collect();
    assert_eq!(malformed.len(), 3);
    assert!(!malformed[0].terminal);
    assert!(!malformed[1].terminal);

    settle().await;
    assert_eq!(harness.transport.subscribe_requests().len(), 4);
    assert_eq!(harness.subscriber.current_cursor(), None);
}

#[tokio::test]
async fn composition_change_loses_no_messages() {
    let harness = make_harness(test_config());
    harness.transport.push_response(subscribe_response(
        100,
        vec![message_entry("room1", 100, json!("first"))],
    ));
    let held = harness.transport.push_held();

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");
    harness
        .transport
        .wait_for_requests(Operation::Subscribe, 2)
        .await;

    harness.transport.push_response(subscribe_response(
        160,
        vec![
            message_entry("room1", 150, json!("second")),
            message_entry("room2", 160, json!("third")),
        ],
    ));
    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room2"]))
        .await
        .expect("subscribe should be accepted");

    let requests = harness
        .transport
        .wait_for_requests(Operation::Subscribe, 3)
        .await;
    assert_eq!(requests[2].channels, channel_names(&["room1", "room2"]));
    assert_eq!(requests[2].cursor, Some(Cursor::new(100, Some(TEST_REGION))));
    wait_until_cancelled(&held).await;

    let messages = harness.listener.wait_for_messages(3).await;
    let payloads: Vec<_> = messages.iter().map(|message| message.payload.clone()).collect();
    assert_eq!(payloads, vec![json!("first"), json!("second"), json!("third")]);

    settle().await;
    assert_eq!(harness.listener.messages().len(), 3);
}

#[tokio::test]
async fn restart_discards_the_stale_long_poll() {
    let harness = make_harness(test_config());
    let held = harness.transport.push_held();

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");
    harness
        .transport
        .wait_for_requests(Operation::Subscribe, 1)
        .await;

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room2"]))
        .await
        .expect("subscribe should be accepted");
    harness
        .transport
        .wait_for_requests(Operation::Subscribe, 2)
        .await;
    wait_until_cancelled(&held).await;

    let delivered = held.complete(Ok(subscribe_response(
        500,
        vec![message_entry("room1", 500, json!("stale"))],
    )));
    assert!(!delivered);

    settle().await;
    assert!(harness.listener.messages().is_empty());
    assert_eq!(harness.subscriber.current_cursor(), None);
    assert!(harness.transport.cancelled_count() >= 1);
}

#[tokio::test]
async fn batch_is_delivered_in_timetoken_order() {
    let harness = make_harness(test_config());
    harness.transport.push_response(subscribe_response(
        3,
        vec![
            message_entry("room1", 1, json!(1)),
            message_entry("room1", 2, json!(2)),
            message_entry("room1", 3, json!(3)),
        ],
    ));

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");

    let timetokens: Vec<_> = harness
        .listener
        .wait_for_messages(3)
        .await
        .iter()
        .map(|message| message.meta.timetoken)
        .collect();
    assert_eq!(timetokens, vec![Timetoken(1), Timetoken(2), Timetoken(3)]);
}

#[tokio::test]
async fn redelivered_messages_are_suppressed() {
    let harness = make_harness(test_config());
    harness.transport.push_response(subscribe_response(
        100,
        vec![message_entry("room1", 100, json!("a"))],
    ));
    harness.transport.push_response(subscribe_response(
        200,
        vec![
            message_entry("room1", 100, json!("a")),
            message_entry("room1", 200, json!("b")),
        ],
    ));

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");

    harness
        .transport
        .wait_for_requests(Operation::Subscribe, 3)
        .await;
    let messages = harness.listener.wait_for_messages(2).await;
    settle().await;

    assert_eq!(harness.listener.messages().len(), 2);
    assert_eq!(messages[0].payload, json!("a"));
    assert_eq!(messages[1].payload, json!("b"));
    assert_eq!(
        harness.subscriber.current_cursor(),
        Some(Cursor::new(200, Some(TEST_REGION)))
    );
}

#[tokio::test]
async fn explicit_timetoken_overrides_start_position() {
    let harness = make_harness(test_config());

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]).with_timetoken(17_000_000_000_000_000u64))
        .await
        .expect("subscribe should be accepted");

    let requests = harness
        .transport
        .wait_for_requests(Operation::Subscribe, 1)
        .await;
    assert_eq!(
        requests[0].cursor.map(|cursor| cursor.timetoken),
        Some(Timetoken(17_000_000_000_000_000))
    );
}

#[tokio::test]
async fn transport_cancellation_is_retried_with_backoff() {
    let harness = make_harness(test_config());
    for _ in 0..3 {
        harness.transport.push_failure(TransportError::Cancelled);
    }
    harness.transport.push_response(handshake_response(300));

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");

    harness
        .listener
        .wait_for_status(StatusCategory::Reconnected)
        .await;

    let statuses = harness.listener.statuses();
    assert_eq!(
        harness.listener.status_categories(),
        vec![
            StatusCategory::Cancelled,
            StatusCategory::Cancelled,
            StatusCategory::Cancelled,
            StatusCategory::Reconnected,
        ]
    );
    assert_eq!(
        statuses[..3]
            .iter()
            .map(|status| status.attempt)
            .collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(statuses.iter().all(|status| !status.terminal));
}

#[tokio::test]
async fn repeated_transport_cancellation_does_not_spin() {
    integration_test_utils::init_logging();
    let transport = Arc::new(AbandoningTransport::default());
    let subscriber = Subscriber::new(
        "abandoning",
        test_config(),
        transport.clone(),
        Arc::new(JsonDecoder::new()),
        None,
    )
    .expect("subscriber creation should succeed");
    let listener = RecordingListener::new();
    subscriber.add_listener(Arc::new(listener.clone()));

    subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");
    tokio::time::sleep(Duration::from_millis(200)).await;

    // 5, 10, then 20 ms per attempt allows roughly a dozen requests in this window.
    let sent = transport.sent.load(Ordering::SeqCst);
    assert!(sent >= 2, "expected retries, saw {sent} requests");
    assert!(sent < 40, "long-poll reissued {sent} times in 200ms");

    let cancelled = listener.wait_for_status(StatusCategory::Cancelled).await;
    assert!(cancelled.is_error);
    assert!(!cancelled.terminal);
}

#[tokio::test]
async fn network_failure_without_catch_up_resumes_at_now() {
    let config = SubscriberConfig {
        catch_up_on_subscription_restore: false,
        ..test_config()
    };
    let harness = make_harness(config);
    harness.transport.push_response(handshake_response(100));
    harness
        .transport
        .push_failure(TransportError::ConnectionReset("reset".to_string()));

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");

    let requests = harness
        .transport
        .wait_for_requests(Operation::Subscribe, 3)
        .await;
    assert_eq!(requests[0].cursor, None);
    assert_eq!(requests[1].cursor, Some(Cursor::new(100, Some(TEST_REGION))));
    assert_eq!(requests[2].cursor, None);

    let network = harness
        .listener
        .wait_for_status(StatusCategory::NetworkIssues)
        .await;
    assert!(!network.terminal);
}
