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

mod config;

use crate::config::Config;
use async_trait::async_trait;
use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use subscribe_http::{HttpTransport, JsonDecoder};
use subscribe_loop::{
    MessageActionEvent, MessageEvent, ObjectEvent, PresenceEvent, Status, SubscribeListener,
    Subscriber,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command()]
struct SubscriberArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,

    /// Name used to tag this subscriber's log lines.
    #[arg(short, long, default_value = "configurable-subscriber")]
    name: String,
}

struct LoggingListener;

#[async_trait]
impl SubscribeListener for LoggingListener {
    async fn on_message(&self, message: MessageEvent) {
        info!(
            channel = %message.meta.channel,
            timetoken = %message.meta.timetoken,
            publisher = message.meta.publisher.as_deref().unwrap_or("unknown"),
            payload = %message.content(),
            "message"
        );
    }

    async fn on_signal(&self, signal: MessageEvent) {
        info!(
            channel = %signal.meta.channel,
            payload = %signal.content(),
            "signal"
        );
    }

    async fn on_presence(&self, presence: PresenceEvent) {
        info!(
            channel = %presence.meta.channel,
            action = ?presence.action,
            uuid = presence.uuid.as_deref().unwrap_or("-"),
            occupancy = presence.occupancy,
            "presence"
        );
    }

    async fn on_object(&self, object: ObjectEvent) {
        info!(
            channel = %object.meta.channel,
            entity = ?object.entity,
            action = %object.action,
            "object"
        );
    }

    async fn on_membership(&self, membership: ObjectEvent) {
        info!(
            channel = %membership.meta.channel,
            action = %membership.action,
            "membership"
        );
    }

    async fn on_message_action(&self, action: MessageActionEvent) {
        info!(
            channel = %action.meta.channel,
            action = %action.action,
            "message action"
        );
    }

    async fn on_status(&self, status: Status) {
        if status.is_error {
            warn!(
                category = %status.category,
                operation = status.operation.as_str(),
                attempt = status.attempt,
                terminal = status.terminal,
                message = status.message.as_deref().unwrap_or(""),
                "status"
            );
        } else {
            info!(
                category = %status.category,
                operation = status.operation.as_str(),
                channels = ?status.subscribed_channels,
                channel_groups = ?status.subscribed_channel_groups,
                "status"
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = tracing_subscriber::fmt::try_init();

    let args = SubscriberArgs::parse();
    let config = Config::load(&args.config)?;
    let request = config.subscription.to_request()?;

    info!(name = %args.name, config = %args.config, "starting configurable-subscriber");

    let transport = Arc::new(HttpTransport::new(config.http)?);
    let subscriber = Subscriber::new(
        &args.name,
        config.subscriber,
        transport,
        Arc::new(JsonDecoder::new()),
        None,
    )?;
    subscriber.add_listener(Arc::new(LoggingListener));
    subscriber.subscribe(request).await?;

    tokio::signal::ctrl_c().await?;
    info!(name = %args.name, "shutting down");
    subscriber.unsubscribe_from_all().await?;

    Ok(())
}
