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

//! Read position of the subscribe loop in the combined event stream.

use crate::observability::{events, fields};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

const COMPONENT: &str = "cursor";

/// Timetoken units per second.
pub const TIMETOKEN_UNITS_PER_SECOND: u64 = 10_000_000;

const NANOS_PER_UNIT: u64 = 1_000_000_000 / TIMETOKEN_UNITS_PER_SECOND;

/// Server-assigned position with 17-digit precision (100ns units since the unix epoch).
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct Timetoken(pub u64);

impl Timetoken {
    pub const ZERO: Timetoken = Timetoken(0);

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Converts a wall-clock time; times before the epoch map to [`Timetoken::ZERO`] and
    /// times past the representable range saturate at `u64::MAX`.
    pub fn from_system_time(time: SystemTime) -> Self {
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        let units = since_epoch
            .as_secs()
            .saturating_mul(TIMETOKEN_UNITS_PER_SECOND)
            .saturating_add(u64::from(since_epoch.subsec_nanos()) / NANOS_PER_UNIT);
        Timetoken(units)
    }

    pub fn to_system_time(&self) -> SystemTime {
        let seconds = self.0 / TIMETOKEN_UNITS_PER_SECOND;
        let nanos = (self.0 % TIMETOKEN_UNITS_PER_SECOND) * NANOS_PER_UNIT;
        UNIX_EPOCH + Duration::new(seconds, nanos as u32)
    }
}

impl From<u64> for Timetoken {
    fn from(value: u64) -> Self {
        Timetoken(value)
    }
}

impl FromStr for Timetoken {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Timetoken)
    }
}

impl Display for Timetoken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timetoken plus the region tag that must be echoed back on the next request.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Cursor {
    pub timetoken: Timetoken,
    pub region: Option<u32>,
}

impl Cursor {
    pub fn new(timetoken: u64, region: Option<u32>) -> Self {
        Self {
            timetoken: Timetoken(timetoken),
            region,
        }
    }
}

impl Display for Cursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.region {
            Some(region) => write!(f, "{}@{}", self.timetoken, region),
            None => write!(f, "{}", self.timetoken),
        }
    }
}

/// Stored cursor owned by the driver task. Empty means "start at now".
#[derive(Debug, Default)]
pub(crate) struct CursorPosition {
    current: Option<Cursor>,
}

impl CursorPosition {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn current(&self) -> Option<Cursor> {
        self.current
    }

    /// Writes `next` through unless it would move the timetoken backward.
    ///
    /// Returns `true` when the stored cursor was updated.
    pub(crate) fn advance(&mut self, next: Cursor) -> bool {
        if let Some(current) = self.current {
            if next.timetoken < current.timetoken {
                warn!(
                    event = events::CURSOR_REGRESSION_IGNORED,
                    component = COMPONENT,
                    current = %fields::format_cursor(Some(current)),
                    received = %fields::format_cursor(Some(next)),
                    "server returned an older timetoken; keeping current cursor"
                );
                return false;
            }
        }

        self.current = Some(next);
        true
    }

    /// Forgets the stored position so the next request starts at "now".
    pub(crate) fn reset(&mut self) {
        self.current = None;
    }

    /// Replaces the position with a caller-supplied start point. Zero behaves like
    /// [`CursorPosition::reset`].
    pub(crate) fn override_start(&mut self, timetoken: Timetoken) {
        if timetoken.is_zero() {
            self.reset();
        } else {
            self.current = Some(Cursor {
                timetoken,
                region: None,
            });
        }
    }
}
