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

//! Loop-owned state layer.
//!
//! Holds the subscription registry, the read cursor and the redelivery cache. All three
//! are owned by the driver task; application threads only observe published snapshots.

pub(crate) mod cursor;
pub(crate) mod dedup_cache;
pub(crate) mod subscription_set;
