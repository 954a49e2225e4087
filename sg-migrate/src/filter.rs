//! Filter engine.
//!
//! Strips what must not be copied before any identifier is remapped:
//!
//! 1. Account-wide `default` rule sets (no owning network) are dropped.
//! 2. Provider-injected allow-all egress rules are dropped unless default
//!    group rules are preserved.
//! 3. Rules referencing other rule sets are pulled out into per-owner side
//!    collections, to be re-applied once every destination identifier exists.
//!    Inside a `default` rule set such rules are discarded instead, unless
//!    default group rules are preserved.
//!
//! Rules whose only rule-set reference is their owner stay inline; they are
//! bound to the owner's new identifier at creation time.

use std::collections::BTreeMap;

use ruleset_core::{Direction, Rule, RuleSet};
use serde::Serialize;
use tracing::{debug, info};

use crate::self_ref::tag_self_references;

/// Filter behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterOptions {
    /// Keep allow-all egress and rule-set references of `default` rule sets.
    pub preserve_default_group_rules: bool,
}

/// Rules extracted for deferred application, keyed by the owner's source id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossGroupRules {
    pub inbound: BTreeMap<String, Vec<Rule>>,
    pub outbound: BTreeMap<String, Vec<Rule>>,
}

impl CrossGroupRules {
    pub fn get(&self, direction: Direction) -> &BTreeMap<String, Vec<Rule>> {
        match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        }
    }

    fn get_mut(&mut self, direction: Direction) -> &mut BTreeMap<String, Vec<Rule>> {
        match direction {
            Direction::Inbound => &mut self.inbound,
            Direction::Outbound => &mut self.outbound,
        }
    }

    /// Number of extracted rules in both directions.
    pub fn rule_count(&self) -> usize {
        self.inbound.values().chain(self.outbound.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count() == 0
    }

    /// Every extracted rule, in both directions.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.inbound
            .values()
            .chain(self.outbound.values())
            .flatten()
    }
}

/// Counts of what the filter removed or moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub dropped_rule_sets: usize,
    pub dropped_wide_open: usize,
    pub discarded_default_refs: usize,
    pub extracted: usize,
}

/// Filtered rule sets plus the cross-group rules taken out of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub rule_sets: Vec<RuleSet>,
    pub cross_group: CrossGroupRules,
    pub stats: FilterStats,
}

/// Apply the filter policy to the fetched source rule sets.
pub fn filter_rule_sets(rule_sets: Vec<RuleSet>, options: FilterOptions) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    for rule_set in rule_sets.into_iter().map(tag_self_references) {
        if is_orphan_default(&rule_set) {
            info!(
                "rule set {}({}) has no network, not copying it",
                rule_set.name, rule_set.id
            );
            outcome.stats.dropped_rule_sets += 1;
            continue;
        }
        let filtered = filter_one(rule_set, options, &mut outcome);
        outcome.rule_sets.push(filtered);
    }

    debug!(
        "filter kept {} rule sets, extracted {} cross-group rules",
        outcome.rule_sets.len(),
        outcome.stats.extracted
    );
    outcome
}

fn is_orphan_default(rule_set: &RuleSet) -> bool {
    rule_set.is_default() && rule_set.network_id.trim().is_empty()
}

fn filter_one(rule_set: RuleSet, options: FilterOptions, outcome: &mut FilterOutcome) -> RuleSet {
    let mut kept = RuleSet {
        inbound: Vec::new(),
        outbound: Vec::new(),
        ..rule_set.clone()
    };

    for direction in Direction::ALL {
        for rule in rule_set.rules(direction) {
            match classify(&rule_set, direction, rule, options) {
                RuleFate::Keep => kept.rules_mut(direction).push(rule.clone()),
                RuleFate::DropWideOpen => outcome.stats.dropped_wide_open += 1,
                RuleFate::DiscardDefaultRef => outcome.stats.discarded_default_refs += 1,
                RuleFate::Extract => {
                    outcome
                        .cross_group
                        .get_mut(direction)
                        .entry(rule_set.id.clone())
                        .or_default()
                        .push(rule.clone());
                    outcome.stats.extracted += 1;
                }
            }
        }
    }
    kept
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleFate {
    Keep,
    DropWideOpen,
    DiscardDefaultRef,
    Extract,
}

fn classify(
    owner: &RuleSet,
    direction: Direction,
    rule: &Rule,
    options: FilterOptions,
) -> RuleFate {
    if direction == Direction::Outbound
        && !options.preserve_default_group_rules
        && rule.is_wide_open()
    {
        return RuleFate::DropWideOpen;
    }
    if !rule.references_any_group() {
        return RuleFate::Keep;
    }
    if owner.is_default() && !options.preserve_default_group_rules {
        return RuleFate::DiscardDefaultRef;
    }
    if rule.references_foreign_group() {
        return RuleFate::Extract;
    }
    RuleFate::Keep
}
