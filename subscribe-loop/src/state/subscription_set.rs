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

//! Registry of channels and channel groups covered by the subscribe loop.

use crate::error::SubscribeError;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Suffix of the companion channel carrying presence events for a channel or group.
pub const PRESENCE_SUFFIX: &str = "-pnpres";

/// Flat key/value document attached to the local identity on one channel or group.
pub type ClientState = Map<String, Value>;

pub fn is_presence_name(name: &str) -> bool {
    name.ends_with(PRESENCE_SUFFIX)
}

pub fn presence_name(name: &str) -> String {
    format!("{name}{PRESENCE_SUFFIX}")
}

/// Rejects empty names before they reach the set.
pub(crate) fn validate_names(names: &[String], kind: &str) -> Result<(), SubscribeError> {
    if names.iter().any(|name| name.trim().is_empty()) {
        return Err(SubscribeError::configuration(format!(
            "{kind} names must not be empty"
        )));
    }
    Ok(())
}

/// Immutable copy of the set taken when a request is issued.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubscriptionSnapshot {
    pub channels: Vec<String>,
    pub channel_groups: Vec<String>,
    pub presence_channels: Vec<String>,
    pub presence_groups: Vec<String>,
    pub state: BTreeMap<String, ClientState>,
    pub filter_expression: Option<String>,
}

impl SubscriptionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
            && self.channel_groups.is_empty()
            && self.presence_channels.is_empty()
            && self.presence_groups.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = name.to_string();
        self.channels.contains(&name)
            || self.channel_groups.contains(&name)
            || self.presence_channels.contains(&name)
            || self.presence_groups.contains(&name)
    }

    /// Every channel name carried on the long-poll request, presence companions included.
    pub fn subscribe_channels(&self) -> Vec<String> {
        merge_sorted(&self.channels, &self.presence_channels)
    }

    /// Every group name carried on the long-poll request, presence companions included.
    pub fn subscribe_channel_groups(&self) -> Vec<String> {
        merge_sorted(&self.channel_groups, &self.presence_groups)
    }

    /// State for the given entities only, ready to attach to a request.
    pub fn state_for(&self, channels: &[String], groups: &[String]) -> BTreeMap<String, ClientState> {
        self.state
            .iter()
            .filter(|(entity, _)| channels.contains(entity) || groups.contains(entity))
            .map(|(entity, state)| (entity.clone(), state.clone()))
            .collect()
    }
}

fn merge_sorted(left: &[String], right: &[String]) -> Vec<String> {
    left.iter()
        .chain(right.iter())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Names actually removed by an unsubscribe call.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Removed {
    pub(crate) channels: Vec<String>,
    pub(crate) channel_groups: Vec<String>,
}

impl Removed {
    pub(crate) fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.channel_groups.is_empty()
    }

    /// Non-presence entries, which are the ones a leave announcement is sent for.
    pub(crate) fn leave_targets(&self) -> (Vec<String>, Vec<String>) {
        let channels = self
            .channels
            .iter()
            .filter(|name| !is_presence_name(name))
            .cloned()
            .collect();
        let groups = self
            .channel_groups
            .iter()
            .filter(|name| !is_presence_name(name))
            .cloned()
            .collect();
        (channels, groups)
    }
}

/// Mutable set owned by the driver task.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionSet {
    channels: BTreeSet<String>,
    channel_groups: BTreeSet<String>,
    presence_channels: BTreeSet<String>,
    presence_groups: BTreeSet<String>,
    state: BTreeMap<String, ClientState>,
    filter_expression: Option<String>,
}

impl SubscriptionSet {
    pub(crate) fn new(filter_expression: Option<String>) -> Self {
        Self {
            filter_expression,
            ..Default::default()
        }
    }

    /// Adds channels (and their presence companions when `observe_presence`).
    ///
    /// Returns `true` if the composition changed. State is updated either way.
    pub(crate) fn add_channels(
        &mut self,
        names: &[String],
        observe_presence: bool,
        state: Option<&ClientState>,
    ) -> bool {
        Self::add_entries(
            &mut self.channels,
            &mut self.presence_channels,
            &mut self.state,
            names,
            observe_presence,
            state,
        )
    }

    pub(crate) fn add_channel_groups(
        &mut self,
        names: &[String],
        observe_presence: bool,
        state: Option<&ClientState>,
    ) -> bool {
        Self::add_entries(
            &mut self.channel_groups,
            &mut self.presence_groups,
            &mut self.state,
            names,
            observe_presence,
            state,
        )
    }

    fn add_entries(
        entries: &mut BTreeSet<String>,
        presence_entries: &mut BTreeSet<String>,
        entity_state: &mut BTreeMap<String, ClientState>,
        names: &[String],
        observe_presence: bool,
        state: Option<&ClientState>,
    ) -> bool {
        let mut changed = false;
        for name in names {
            if is_presence_name(name) {
                changed |= presence_entries.insert(name.clone());
                continue;
            }

            changed |= entries.insert(name.clone());
            if observe_presence {
                changed |= presence_entries.insert(presence_name(name));
            }
            if let Some(state) = state {
                entity_state.insert(name.clone(), state.clone());
            }
        }
        changed
    }

    /// Removes channels; presence companions go too when `include_presence`.
    pub(crate) fn remove_channels(&mut self, names: &[String], include_presence: bool) -> Vec<String> {
        Self::remove_entries(
            &mut self.channels,
            &mut self.presence_channels,
            &mut self.state,
            names,
            include_presence,
        )
    }

    pub(crate) fn remove_channel_groups(
        &mut self,
        names: &[String],
        include_presence: bool,
    ) -> Vec<String> {
        Self::remove_entries(
            &mut self.channel_groups,
            &mut self.presence_groups,
            &mut self.state,
            names,
            include_presence,
        )
    }

    fn remove_entries(
        entries: &mut BTreeSet<String>,
        presence_entries: &mut BTreeSet<String>,
        entity_state: &mut BTreeMap<String, ClientState>,
        names: &[String],
        include_presence: bool,
    ) -> Vec<String> {
        let mut removed = Vec::new();
        for name in names {
            if is_presence_name(name) {
                if presence_entries.remove(name) {
                    removed.push(name.clone());
                }
                continue;
            }

            if entries.remove(name) {
                removed.push(name.clone());
            }
            entity_state.remove(name);
            if include_presence {
                let companion = presence_name(name);
                if presence_entries.remove(&companion) {
                    removed.push(companion);
                }
            }
        }
        removed
    }

    /// Clears every collection, returning what was removed.
    pub(crate) fn remove_all(&mut self) -> Removed {
        let channels = std::mem::take(&mut self.channels)
            .into_iter()
            .chain(std::mem::take(&mut self.presence_channels))
            .collect();
        let channel_groups = std::mem::take(&mut self.channel_groups)
            .into_iter()
            .chain(std::mem::take(&mut self.presence_groups))
            .collect();
        self.state.clear();

        Removed {
            channels,
            channel_groups,
        }
    }

    /// Replaces (or with `None` clears) the state attached to `entity`.
    pub(crate) fn set_state(&mut self, entity: &str, state: Option<ClientState>) {
        match state {
            Some(state) => {
                self.state.insert(entity.to_string(), state);
            }
            None => {
                self.state.remove(entity);
            }
        }
    }

    /// Returns `true` if the expression changed.
    pub(crate) fn set_filter_expression(&mut self, filter_expression: Option<String>) -> bool {
        if self.filter_expression == filter_expression {
            return false;
        }
        self.filter_expression = filter_expression;
        true
    }

    pub(crate) fn is_subscribed(&self, name: &str) -> bool {
        self.channels.contains(name)
            || self.channel_groups.contains(name)
            || self.presence_channels.contains(name)
            || self.presence_groups.contains(name)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.channels.is_empty()
            && self.channel_groups.is_empty()
            && self.presence_channels.is_empty()
            && self.presence_groups.is_empty()
    }

    pub(crate) fn snapshot(&self) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            channels: self.channels.iter().cloned().collect(),
            channel_groups: self.channel_groups.iter().cloned().collect(),
            presence_channels: self.presence_channels.iter().cloned().collect(),
            presence_groups: self.presence_groups.iter().cloned().collect(),
            state: self.state.clone(),
            filter_expression: self.filter_expression.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_names, ClientState, SubscriptionSet, PRESENCE_SUFFIX};
    use serde_json::json;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn state(value: serde_json::Value) -> ClientState {
        value.as_object().cloned().expect("state must be an object")
    }

    #[test]
    fn add_channels_is_idempotent_for_membership() {
        let mut set = SubscriptionSet::new(None);

        assert!(set.add_channels(&names(&["room1", "room2"]), false, None));
        assert!(!set.add_channels(&names(&["room1"]), false, None));

        let snapshot = set.snapshot();
        assert_eq!(snapshot.channels, names(&["room1", "room2"]));
        assert!(snapshot.presence_channels.is_empty());
    }

    #[test]
    fn re_adding_channel_updates_state_without_composition_change() {
        let mut set = SubscriptionSet::new(None);
        set.add_channels(&names(&["room1"]), false, Some(&state(json!({"mood": "ok"}))));

        let changed = set.add_channels(&names(&["room1"]), false, Some(&state(json!({"mood": "great"}))));

        assert!(!changed);
        assert_eq!(set.snapshot().state["room1"]["mood"], json!("great"));
    }

    #[test]
    fn observe_presence_adds_companion_channels() {
        let mut set = SubscriptionSet::new(None);
        set.add_channels(&names(&["room1"]), true, None);
        set.add_channel_groups(&names(&["lobby"]), true, None);

        let snapshot = set.snapshot();
        assert_eq!(snapshot.presence_channels, vec![format!("room1{PRESENCE_SUFFIX}")]);
        assert_eq!(snapshot.presence_groups, vec![format!("lobby{PRESENCE_SUFFIX}")]);
        assert_eq!(snapshot.subscribe_channels(), names(&["room1", "room1-pnpres"]));
        assert!(set.is_subscribed("room1-pnpres"));
    }

    #[test]
    fn presence_names_register_only_presence_entries() {
        let mut set = SubscriptionSet::new(None);
        set.add_channels(&names(&["room1-pnpres"]), false, None);

        let snapshot = set.snapshot();
        assert!(snapshot.channels.is_empty());
        assert_eq!(snapshot.presence_channels, names(&["room1-pnpres"]));
    }

    #[test]
    fn remove_channels_reports_removed_names_and_drops_state() {
        let mut set = SubscriptionSet::new(None);
        set.add_channels(&names(&["room1", "room2"]), true, Some(&state(json!({"a": 1}))));

        let removed = set.remove_channels(&names(&["room1", "missing"]), true);

        assert_eq!(removed, names(&["room1", "room1-pnpres"]));
        let snapshot = set.snapshot();
        assert_eq!(snapshot.channels, names(&["room2"]));
        assert_eq!(snapshot.presence_channels, names(&["room2-pnpres"]));
        assert!(!snapshot.state.contains_key("room1"));
        assert!(snapshot.state.contains_key("room2"));
    }

    #[test]
    fn remove_all_clears_everything() {
        let mut set = SubscriptionSet::new(None);
        set.add_channels(&names(&["room1"]), true, None);
        set.add_channel_groups(&names(&["lobby"]), false, None);

        let removed = set.remove_all();

        assert!(set.is_empty());
        assert_eq!(removed.channels, names(&["room1", "room1-pnpres"]));
        assert_eq!(removed.channel_groups, names(&["lobby"]));
        assert_eq!(removed.leave_targets(), (names(&["room1"]), names(&["lobby"])));
    }

    #[test]
    fn snapshot_state_for_filters_entities() {
        let mut set = SubscriptionSet::new(None);
        set.add_channels(&names(&["room1"]), false, Some(&state(json!({"a": 1}))));
        set.set_state("room9", Some(state(json!({"b": 2}))));

        let snapshot = set.snapshot();
        let filtered = snapshot.state_for(&names(&["room1"]), &[]);

        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("room1"));
    }

    #[test]
    fn filter_expression_change_is_reported() {
        let mut set = SubscriptionSet::new(Some("a == 1".to_string()));

        assert!(!set.set_filter_expression(Some("a == 1".to_string())));
        assert!(set.set_filter_expression(None));
        assert_eq!(set.snapshot().filter_expression, None);
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(validate_names(&names(&["room1"]), "channel").is_ok());
        assert!(validate_names(&names(&["room1", ""]), "channel").is_err());
        assert!(validate_names(&names(&["  "]), "channel group").is_err());
    }
}
