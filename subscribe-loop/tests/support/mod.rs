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

use integration_test_utils::{RecordingListener, ScriptedTransport};
use std::sync::Arc;
use std::time::Duration;
use subscribe_http::JsonDecoder;
use subscribe_loop::{Cipher, RetryConfig, Subscriber, SubscriberConfig};

pub(crate) struct Harness {
    pub(crate) subscriber: Subscriber,
    pub(crate) transport: ScriptedTransport,
    pub(crate) listener: RecordingListener,
}

/// Short, jitter-free backoff so retry scenarios finish quickly.
pub(crate) fn test_config() -> SubscriberConfig {
    SubscriberConfig {
        user_id: "tester".to_string(),
        retry: RetryConfig {
            initial_delay_ms: 5,
            max_delay_ms: 20,
            jitter: 0.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub(crate) fn make_harness(config: SubscriberConfig) -> Harness {
    make_harness_with_cipher(config, None)
}

pub(crate) fn make_harness_with_cipher(
    config: SubscriberConfig,
    cipher: Option<Arc<dyn Cipher>>,
) -> Harness {
    integration_test_utils::init_logging();

    let transport = ScriptedTransport::new();
    let subscriber = Subscriber::new(
        "test",
        config,
        Arc::new(transport.clone()),
        Arc::new(JsonDecoder::new()),
        cipher,
    )
    .expect("subscriber creation should succeed");

    let listener = RecordingListener::new();
    assert!(subscriber.add_listener(Arc::new(listener.clone())));

    Harness {
        subscriber,
        transport,
        listener,
    }
}

/// Lets spawned tasks run so that "nothing happened" assertions are meaningful.
#[allow(dead_code)]
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[allow(dead_code)]
pub(crate) async fn wait_until_cancelled(held: &integration_test_utils::HeldReply) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !held.is_cancelled() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "held long-poll was never cancelled");
}
