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

//! `reqwest`-backed [`Transport`] for the REST subscribe and presence endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error as _;
use subscribe_loop::{Operation, Request, Response, Transport, TransportError};
use thiserror::Error;
use tracing::{debug, Level};
use url::Url;

pub const DEFAULT_ORIGIN: &str = "https://ps.pndsn.com";

const COMPONENT: &str = "http_transport";
/// Placeholder path segment for requests that only target channel groups.
const EMPTY_CHANNEL_LIST: &str = ",";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpTransportConfig {
    pub origin: String,
    pub subscribe_key: String,
    pub auth_key: Option<String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            subscribe_key: String::new(),
            auth_key: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum HttpTransportError {
    #[error("invalid origin {origin}: {source}")]
    InvalidOrigin {
        origin: String,
        source: url::ParseError,
    },

    #[error("origin {0} cannot carry a path")]
    OriginCannotBeBase(String),

    #[error("subscribe key must not be empty")]
    MissingSubscribeKey,

    #[error("unable to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Clone, Debug)]
pub struct HttpTransport {
    origin: Url,
    subscribe_key: String,
    auth_key: Option<String>,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, HttpTransportError> {
        if config.subscribe_key.trim().is_empty() {
            return Err(HttpTransportError::MissingSubscribeKey);
        }

        let origin =
            Url::parse(&config.origin).map_err(|source| HttpTransportError::InvalidOrigin {
                origin: config.origin.clone(),
                source,
            })?;
        if origin.cannot_be_a_base() {
            return Err(HttpTransportError::OriginCannotBeBase(config.origin));
        }

        Ok(Self {
            origin,
            subscribe_key: config.subscribe_key,
            auth_key: config.auth_key,
            client: reqwest::Client::builder().build()?,
        })
    }

    /// Full request URL, path and query included.
    pub fn build_url(&self, request: &Request) -> Result<Url, TransportError> {
        let mut url = self.origin.clone();
        let channels = if request.channels.is_empty() {
            EMPTY_CHANNEL_LIST.to_string()
        } else {
            request.channels.join(",")
        };

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| TransportError::Other("origin cannot carry a path".to_string()))?;
            segments.clear();
            match request.operation {
                Operation::Subscribe => {
                    segments.extend(["v2", "subscribe", &self.subscribe_key, &channels, "0"]);
                }
                Operation::Heartbeat => {
                    segments.extend([
                        "v2",
                        "presence",
                        "sub-key",
                        &self.subscribe_key,
                        "channel",
                        &channels,
                        "heartbeat",
                    ]);
                }
                Operation::Leave | Operation::Unsubscribe => {
                    segments.extend([
                        "v2",
                        "presence",
                        "sub-key",
                        &self.subscribe_key,
                        "channel",
                        &channels,
                        "leave",
                    ]);
                }
            }
        }

        {
            let mut query = url.query_pairs_mut();
            if request.operation == Operation::Subscribe {
                let (timetoken, region) = match request.cursor {
                    Some(cursor) => (cursor.timetoken.to_string(), cursor.region),
                    None => ("0".to_string(), None),
                };
                query.append_pair("tt", &timetoken);
                if let Some(region) = region {
                    query.append_pair("tr", &region.to_string());
                }
                if let Some(filter_expression) = &request.filter_expression {
                    query.append_pair("filter-expr", filter_expression);
                }
            }
            if !request.channel_groups.is_empty() {
                query.append_pair("channel-group", &request.channel_groups.join(","));
            }
            if matches!(request.operation, Operation::Subscribe | Operation::Heartbeat)
                && !request.state.is_empty()
            {
                let state = serde_json::to_string(&request.state)
                    .map_err(|err| TransportError::Other(err.to_string()))?;
                query.append_pair("state", &state);
            }
            if let Some(heartbeat) = request.heartbeat {
                query.append_pair("heartbeat", &heartbeat.to_string());
            }
            query.append_pair("uuid", &request.user_id);
            if let Some(auth_key) = &self.auth_key {
                query.append_pair("auth", auth_key);
            }
        }

        Ok(url)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }

    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    let lowered = detail.to_ascii_lowercase();

    if lowered.contains("dns") || lowered.contains("resolve") {
        TransportError::Dns(detail)
    } else if lowered.contains("tls") || lowered.contains("certificate") {
        TransportError::Tls(detail)
    } else if err.is_connect() {
        TransportError::ConnectionRefused(detail)
    } else if err.is_request() || err.is_body() {
        TransportError::ConnectionReset(detail)
    } else {
        TransportError::Other(detail)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let url = self.build_url(&request)?;
        if tracing::enabled!(Level::DEBUG) {
            debug!(
                component = COMPONENT,
                operation = request.operation.as_str(),
                path = url.path(),
                "sending request"
            );
        }

        let response = self
            .client
            .get(url)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        debug!(
            component = COMPONENT,
            operation = request.operation.as_str(),
            status,
            bytes = body.len(),
            "received response"
        );
        Ok(Response::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::{HttpTransport, HttpTransportConfig, HttpTransportError};
    use serde_json::json;
    use std::collections::BTreeMap;
    use subscribe_loop::{Cursor, Operation, Request};

    fn transport() -> HttpTransport {
        HttpTransport::new(HttpTransportConfig {
            origin: "https://example.test".to_string(),
            subscribe_key: "sub-c-key".to_string(),
            auth_key: Some("secret".to_string()),
        })
        .expect("transport should build")
    }

    fn query(url: &url::Url) -> BTreeMap<String, String> {
        url.query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect()
    }

    #[test]
    fn subscribe_url_carries_cursor_groups_and_state() {
        let mut state = BTreeMap::new();
        state.insert(
            "room1".to_string(),
            json!({"mood": "ok"}).as_object().cloned().expect("object"),
        );
        let url = transport()
            .build_url(&Request {
                operation: Operation::Subscribe,
                user_id: "reader".to_string(),
                channels: vec!["room1".to_string(), "room1-pnpres".to_string()],
                channel_groups: vec!["lobby".to_string()],
                cursor: Some(Cursor::new(17_000_000_000_000_000, Some(4))),
                filter_expression: Some("region == 'eu'".to_string()),
                state,
                heartbeat: Some(60),
                ..Default::default()
            })
            .expect("url should build");

        assert_eq!(url.path(), "/v2/subscribe/sub-c-key/room1,room1-pnpres/0");
        let query = query(&url);
        assert_eq!(query["tt"], "17000000000000000");
        assert_eq!(query["tr"], "4");
        assert_eq!(query["channel-group"], "lobby");
        assert_eq!(query["filter-expr"], "region == 'eu'");
        assert_eq!(query["heartbeat"], "60");
        assert_eq!(query["uuid"], "reader");
        assert_eq!(query["auth"], "secret");
        assert_eq!(query["state"], r#"{"room1":{"mood":"ok"}}"#);
    }

    #[test]
    fn subscribe_without_cursor_starts_at_zero() {
        let url = transport()
            .build_url(&Request {
                operation: Operation::Subscribe,
                channel_groups: vec!["lobby".to_string()],
                ..Default::default()
            })
            .expect("url should build");

        assert_eq!(url.path(), "/v2/subscribe/sub-c-key/,/0");
        let query = query(&url);
        assert_eq!(query["tt"], "0");
        assert!(!query.contains_key("tr"));
    }

    #[test]
    fn presence_urls_use_presence_endpoints() {
        let heartbeat = transport()
            .build_url(&Request {
                operation: Operation::Heartbeat,
                channels: vec!["room1".to_string()],
                heartbeat: Some(120),
                ..Default::default()
            })
            .expect("url should build");
        let leave = transport()
            .build_url(&Request {
                operation: Operation::Leave,
                channels: vec!["room1".to_string()],
                ..Default::default()
            })
            .expect("url should build");

        assert_eq!(
            heartbeat.path(),
            "/v2/presence/sub-key/sub-c-key/channel/room1/heartbeat"
        );
        assert_eq!(query(&heartbeat)["heartbeat"], "120");
        assert_eq!(
            leave.path(),
            "/v2/presence/sub-key/sub-c-key/channel/room1/leave"
        );
        assert!(!query(&leave).contains_key("tt"));
    }

    #[test]
    fn config_is_validated() {
        assert!(matches!(
            HttpTransport::new(HttpTransportConfig::default()),
            Err(HttpTransportError::MissingSubscribeKey)
        ));
        assert!(matches!(
            HttpTransport::new(HttpTransportConfig {
                origin: "not a url".to_string(),
                subscribe_key: "key".to_string(),
                auth_key: None,
            }),
            Err(HttpTransportError::InvalidOrigin { .. })
        ));
    }
}
