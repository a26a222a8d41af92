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

use integration_test_utils::channel_names;
use std::time::Duration;
use subscribe_loop::{
    HeartbeatNotifications, Operation, PresenceRequest, StatusCategory, SubscribeRequest,
    SubscriberConfig, TransportError,
};
use support::{make_harness, test_config};

fn heartbeat_config(notifications: HeartbeatNotifications) -> SubscriberConfig {
    SubscriberConfig {
        presence_heartbeat_value: 20,
        heartbeat_notifications: notifications,
        ..test_config()
    }
}

#[tokio::test(start_paused = true)]
async fn heartbeat_announces_subscribed_channels() {
    let harness = make_harness(heartbeat_config(HeartbeatNotifications::All));
    assert_eq!(harness.subscriber.config().presence_heartbeat_interval, 9);

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]).and_channel_groups(["lobby"]))
        .await
        .expect("subscribe should be accepted");

    let subscribe = harness
        .transport
        .wait_for_requests(Operation::Subscribe, 1)
        .await;
    assert_eq!(subscribe[0].heartbeat, Some(20));

    harness
        .transport
        .wait_for_requests(Operation::Heartbeat, 1)
        .await;
    let beats = harness
        .transport
        .wait_for_requests(Operation::Heartbeat, 2)
        .await;
    assert_eq!(beats[0].channels, channel_names(&["room1"]));
    assert_eq!(beats[0].channel_groups, channel_names(&["lobby"]));
    assert_eq!(beats[0].heartbeat, Some(20));
    assert_eq!(beats[0].user_id, "tester");

    let ack = harness
        .listener
        .wait_for_status(StatusCategory::Acknowledgment)
        .await;
    assert_eq!(ack.operation, Operation::Heartbeat);
    assert_eq!(ack.affected_channels, channel_names(&["room1"]));

    // The long-poll stayed in flight the whole time.
    assert_eq!(harness.transport.subscribe_requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_failure_is_reported_by_default() {
    let harness = make_harness(heartbeat_config(HeartbeatNotifications::default()));
    harness
        .transport
        .push_presence_reply(Err(TransportError::ConnectionRefused("refused".to_string())));
    harness
        .transport
        .push_presence_reply(Err(TransportError::Cancelled));

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");

    // One beat per interval; each wait covers a single interval.
    for count in 1..=3 {
        harness
            .transport
            .wait_for_requests(Operation::Heartbeat, count)
            .await;
    }
    let network = harness
        .listener
        .wait_for_status(StatusCategory::NetworkIssues)
        .await;
    assert_eq!(network.operation, Operation::Heartbeat);
    assert!(network.is_error);
    assert!(!network.terminal);

    let cancelled = harness
        .listener
        .wait_for_status(StatusCategory::Cancelled)
        .await;
    assert_eq!(cancelled.operation, Operation::Heartbeat);

    // Successful beats are silent with the default notification setting.
    assert!(!harness
        .listener
        .status_categories()
        .contains(&StatusCategory::Acknowledgment));
}

#[tokio::test(start_paused = true)]
async fn heartbeat_is_silent_without_subscriptions() {
    let harness = make_harness(heartbeat_config(HeartbeatNotifications::All));

    tokio::time::sleep(Duration::from_secs(40)).await;

    assert!(harness.transport.requests().is_empty());
    assert!(harness.listener.recorded().is_empty());
}

#[tokio::test(start_paused = true)]
async fn heartbeat_stops_after_unsubscribe_from_all() {
    let harness = make_harness(heartbeat_config(HeartbeatNotifications::None));

    harness
        .subscriber
        .subscribe(SubscribeRequest::channels(["room1"]))
        .await
        .expect("subscribe should be accepted");
    harness
        .transport
        .wait_for_requests(Operation::Heartbeat, 1)
        .await;

    harness
        .subscriber
        .unsubscribe_from_all()
        .await
        .expect("unsubscribe should be accepted");
    harness
        .transport
        .wait_for_requests(Operation::Leave, 1)
        .await;
    let beats_before = harness.transport.requests_for(Operation::Heartbeat).len();

    tokio::time::sleep(Duration::from_secs(40)).await;
    assert_eq!(
        harness.transport.requests_for(Operation::Heartbeat).len(),
        beats_before
    );
}

#[tokio::test(start_paused = true)]
async fn manual_presence_list_drives_heartbeats() {
    let config = SubscriberConfig {
        manage_presence_list_manually: true,
        ..heartbeat_config(HeartbeatNotifications::None)
    };
    let harness = make_harness(config);

    harness
        .subscriber
        .set_presence(PresenceRequest::connect(["room9"]))
        .await
        .expect("presence connect should be accepted");

    let beats = harness
        .transport
        .wait_for_requests(Operation::Heartbeat, 1)
        .await;
    assert_eq!(beats[0].channels, channel_names(&["room9"]));
    assert!(harness.transport.subscribe_requests().is_empty());
}
