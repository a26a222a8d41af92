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

//! # subscribe-http
//!
//! REST collaborators for `subscribe-loop`: [`HttpTransport`] sends subscribe, heartbeat and
//! leave calls to the hosted service with `reqwest`, and [`JsonDecoder`] turns v2 subscribe
//! responses into typed events.
//!
//! ```
//! use subscribe_http::{HttpTransport, HttpTransportConfig};
//! use subscribe_loop::{Operation, Request};
//!
//! let transport = HttpTransport::new(HttpTransportConfig {
//!     subscribe_key: "sub-c-demo".to_string(),
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! let url = transport
//!     .build_url(&Request {
//!         operation: Operation::Subscribe,
//!         user_id: "reader".to_string(),
//!         channels: vec!["room1".to_string()],
//!         ..Default::default()
//!     })
//!     .unwrap();
//! assert_eq!(url.path(), "/v2/subscribe/sub-c-demo/room1/0");
//! ```

mod decoder;
pub use decoder::JsonDecoder;

mod transport;
pub use transport::{HttpTransport, HttpTransportConfig, HttpTransportError, DEFAULT_ORIGIN};
