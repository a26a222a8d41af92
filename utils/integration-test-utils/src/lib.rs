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

mod integration_test_envelopes;
pub use integration_test_envelopes::{
    group_message_entry, handshake_response, message_entry, presence_entry, signal_entry,
    subscribe_body, subscribe_response, TEST_REGION,
};
mod integration_test_listeners;
pub use integration_test_listeners::{Recorded, RecordingListener};
mod integration_test_transport;
pub use integration_test_transport::{HeldReply, ScriptedReply, ScriptedTransport};
mod integration_test_utils;
pub use integration_test_utils::{channel_names, init_logging};
