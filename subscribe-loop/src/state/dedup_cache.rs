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

//! Bounded, insertion-ordered cache of recently delivered event fingerprints.

use crate::state::cursor::Timetoken;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashSet, VecDeque};
use std::hash::{Hash, Hasher};

/// Identity of a delivered event: channel, publish timetoken and payload hash.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Fingerprint {
    channel: String,
    timetoken: Timetoken,
    payload_hash: u64,
}

impl Fingerprint {
    pub fn new(channel: &str, timetoken: Timetoken, payload: &Value) -> Self {
        let mut hasher = DefaultHasher::new();
        // serde_json renders object keys in a stable order, so equal payloads hash equally.
        payload.to_string().hash(&mut hasher);

        Self {
            channel: channel.to_string(),
            timetoken,
            payload_hash: hasher.finish(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn timetoken(&self) -> Timetoken {
        self.timetoken
    }

    pub fn payload_hash(&self) -> u64 {
        self.payload_hash
    }
}

/// Suppresses events already delivered within the last `capacity` insertions.
///
/// Eviction is strictly by insertion order; lookups do not refresh entries.
#[derive(Debug)]
pub struct DedupCache {
    capacity: usize,
    order: VecDeque<Fingerprint>,
    members: HashSet<Fingerprint>,
}

impl DedupCache {
    /// A capacity of zero disables deduplication.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Returns `false` if `fingerprint` was seen; otherwise records it and returns `true`.
    pub fn should_deliver(&mut self, fingerprint: Fingerprint) -> bool {
        if !self.is_enabled() {
            return true;
        }

        if self.members.contains(&fingerprint) {
            return false;
        }

        self.members.insert(fingerprint.clone());
        self.order.push_back(fingerprint);

        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }

        true
    }

    /// Non-mutating membership test.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.members.contains(fingerprint)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Verifies that the ordering queue and the membership set describe the same entries.
    pub(crate) fn check_integrity(&self) -> Result<(), String> {
        if self.order.len() != self.members.len() {
            return Err(format!(
                "dedup cache order holds {} entries but membership holds {}",
                self.order.len(),
                self.members.len()
            ));
        }
        if self.order.len() > self.capacity {
            return Err(format!(
                "dedup cache holds {} entries above capacity {}",
                self.order.len(),
                self.capacity
            ));
        }
        Ok(())
    }

    /// Records an entry in the eviction order without indexing it.
    #[cfg(test)]
    pub(crate) fn insert_unindexed(&mut self, fingerprint: Fingerprint) {
        self.order.push_back(fingerprint);
    }
}
