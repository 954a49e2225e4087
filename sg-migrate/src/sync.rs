//! Sync orchestration.
//!
//! Copies rule sets from a source environment into one destination network
//! in strictly sequential phases:
//!
//! 1. **Fetched**: read source rule sets (all, or the requested ids)
//! 2. **Filtered**: tag self references, drop what must not be copied and
//!    extract cross-group rules
//! 3. **PrefixListsSynced**: clone referenced address lists
//! 4. **GroupsCreated**: create (or reuse) each rule set, record its new id,
//!    apply its inline rules
//! 5. **CrossReferencesApplied**: resolve the extracted rules against the
//!    now complete identity map and append them
//! 6. **Done**
//!
//! A [`Syncer`] is consumed by [`Syncer::run`]; there is no resuming. Any
//! fatal error ends the run with the destination partially updated.
//!
//! ## Existing rule sets
//!
//! `default` is never created: the destination network's own default rule
//! set is reused. Other names that already exist are reused only in update
//! mode. A reused rule set has its current rules revoked first in update
//! mode.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use ruleset_core::{
    AccessControlProvider, Direction, NewRuleSet, ProviderError, Rule, RuleSet, RuleSetFilter,
    DEFAULT_RULE_SET_NAME,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::filter::{filter_rule_sets, CrossGroupRules, FilterOptions, FilterOutcome};
use crate::identity::{IdentityMap, PrefixMap};
use crate::prefix_sync::sync_address_lists;
use crate::resolve::{resolve_cross_group, DanglingReference, Owner, ReferenceMode, TargetResolver};
use crate::summary::{CreatedRuleSet, SkipReason, SkippedReference, SyncSummary};
use crate::tags::creation_tags;

/// Phases of one run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncPhase {
    Fetched,
    Filtered,
    PrefixListsSynced,
    GroupsCreated,
    CrossReferencesApplied,
    Done,
}

impl Display for SyncPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Fetched => "fetched",
            SyncPhase::Filtered => "filtered",
            SyncPhase::PrefixListsSynced => "prefix-lists-synced",
            SyncPhase::GroupsCreated => "groups-created",
            SyncPhase::CrossReferencesApplied => "cross-references-applied",
            SyncPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// What to copy and how to treat conflicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Destination network every rule set is created in.
    pub network_id: String,
    pub source_filter: RuleSetFilter,
    /// Reuse same-named destination rule sets, replacing their rules.
    pub update_existing: bool,
    pub filter: FilterOptions,
    pub reference_mode: ReferenceMode,
    /// Source rule-set names that are never created.
    pub skip_names: Vec<String>,
    /// Recorded in the summary; the caller supplies a planning destination.
    pub dry_run: bool,
}

impl SyncOptions {
    pub fn new(network_id: impl Into<String>) -> Self {
        Self {
            network_id: network_id.into(),
            source_filter: RuleSetFilter::All,
            update_existing: false,
            filter: FilterOptions::default(),
            reference_mode: ReferenceMode::default(),
            skip_names: Vec::new(),
            dry_run: false,
        }
    }
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unable to find network {0:?} in destination")]
    NetworkNotFound(String),
    #[error("rule set {0:?} already exists in destination (use update mode to replace its rules)")]
    DuplicateRuleSet(String),
    #[error("unable to set {direction} rules on newly created rule set {name} ({id}): {source}")]
    AuthorizeFailed {
        name: String,
        id: String,
        direction: Direction,
        source: ProviderError,
    },
    #[error("invalid source filter: {0}")]
    MalformedFilter(String),
    #[error("unable to fetch source rule sets: {0}")]
    Fetch(#[source] ProviderError),
    #[error("unable to create rule set {name}: {source}")]
    Create { name: String, source: ProviderError },
    #[error("unable to look up destination rule set {name}: {source}")]
    Lookup { name: String, source: ProviderError },
    #[error("destination network {network_id} has no rule set named {name}")]
    MissingExisting { name: String, network_id: String },
    #[error("unable to revoke {direction} rules of {name}: {source}")]
    Revoke {
        name: String,
        direction: Direction,
        source: ProviderError,
    },
    #[error(transparent)]
    Dangling(#[from] DanglingReference),
}

/// State threaded through the phases of one run.
#[derive(Debug, Clone, Default)]
pub struct SyncContext {
    pub identity: IdentityMap,
    pub prefixes: PrefixMap,
    /// Destination ids created by this run, as opposed to reused.
    pub fresh: BTreeSet<String>,
    pub summary: SyncSummary,
}

/// One sync run from `source` into `destination`.
pub struct Syncer<'a> {
    source: &'a dyn AccessControlProvider,
    destination: &'a mut dyn AccessControlProvider,
    options: SyncOptions,
    phase: Option<SyncPhase>,
    context: SyncContext,
}

impl<'a> Syncer<'a> {
    pub fn new(
        source: &'a dyn AccessControlProvider,
        destination: &'a mut dyn AccessControlProvider,
        options: SyncOptions,
    ) -> Self {
        let context = SyncContext {
            summary: SyncSummary {
                dry_run: options.dry_run,
                ..SyncSummary::default()
            },
            ..SyncContext::default()
        };
        Self {
            source,
            destination,
            options,
            phase: None,
            context,
        }
    }

    /// Run every phase to completion.
    pub fn run(mut self) -> Result<SyncSummary, SyncError> {
        if self.options.network_id.trim().is_empty() {
            return Err(SyncError::NetworkNotFound(self.options.network_id.clone()));
        }

        let fetched = self.fetch()?;
        let filtered = self.filter(fetched);
        self.sync_prefix_lists(&filtered)?;
        self.create_rule_sets(&filtered.rule_sets)?;
        self.apply_cross_references(&filtered.cross_group)?;
        self.enter(SyncPhase::Done);
        Ok(self.context.summary)
    }

    fn enter(&mut self, phase: SyncPhase) {
        debug_assert!(self.phase.map_or(true, |current| current < phase));
        info!("sync phase: {phase}");
        self.phase = Some(phase);
    }

    fn fetch(&mut self) -> Result<Vec<RuleSet>, SyncError> {
        let fetched = self
            .source
            .list_rule_sets(&self.options.source_filter)
            .map_err(|err| match err {
                ProviderError::MalformedFilter(msg) => SyncError::MalformedFilter(msg),
                other => SyncError::Fetch(other),
            })?;
        info!("fetched {} source rule sets", fetched.len());
        self.enter(SyncPhase::Fetched);
        Ok(fetched)
    }

    fn filter(&mut self, fetched: Vec<RuleSet>) -> FilterOutcome {
        let outcome = filter_rule_sets(fetched, self.options.filter);
        self.context.summary.filter = outcome.stats;
        self.enter(SyncPhase::Filtered);
        outcome
    }

    fn sync_prefix_lists(&mut self, filtered: &FilterOutcome) -> Result<(), SyncError> {
        let report = sync_address_lists(
            self.source,
            &mut *self.destination,
            &filtered.rule_sets,
            &filtered.cross_group,
            self.options.reference_mode,
            &mut self.context.prefixes,
        )?;
        let summary = &mut self.context.summary;
        summary.address_lists.extend(report.cloned);
        summary.skipped.extend(report.skipped);
        self.enter(SyncPhase::PrefixListsSynced);
        Ok(())
    }

    fn create_rule_sets(&mut self, rule_sets: &[RuleSet]) -> Result<(), SyncError> {
        for rule_set in rule_sets {
            self.context
                .identity
                .record_source(&rule_set.id, &rule_set.name);

            if self.options.skip_names.contains(&rule_set.name) {
                info!("excluding rule set {}({})", rule_set.name, rule_set.id);
                self.context.summary.excluded.push(rule_set.name.clone());
                continue;
            }

            let (new_id, fresh) = self.place_rule_set(rule_set)?;
            self.context
                .identity
                .record_destination(&rule_set.name, &new_id);
            if fresh {
                self.context.fresh.insert(new_id.clone());
            }

            let applied = self.apply_inline_rules(rule_set, &new_id, fresh)?;
            info!(
                "{} rule set {}({}) as {} in network {}",
                if fresh { "created" } else { "reused" },
                rule_set.name,
                rule_set.id,
                new_id,
                self.options.network_id
            );
            self.context.summary.rule_sets.push(CreatedRuleSet {
                name: rule_set.name.clone(),
                source_id: rule_set.id.clone(),
                destination_id: new_id,
                reused: !fresh,
                rules: applied,
            });
        }
        self.enter(SyncPhase::GroupsCreated);
        Ok(())
    }

    /// Create the rule set in the destination, or reuse an existing one.
    /// Returns the destination id and whether it was freshly created.
    fn place_rule_set(&mut self, rule_set: &RuleSet) -> Result<(String, bool), SyncError> {
        if rule_set.is_default() {
            return Ok((self.reuse_existing(DEFAULT_RULE_SET_NAME)?, false));
        }

        let request = NewRuleSet {
            name: rule_set.name.clone(),
            description: rule_set.description.clone(),
            network_id: self.options.network_id.clone(),
            tags: creation_tags(&rule_set.tags),
        };
        match self.destination.create_rule_set(&request) {
            Ok(id) => Ok((id, true)),
            Err(ProviderError::NetworkNotFound(network)) => {
                Err(SyncError::NetworkNotFound(network))
            }
            Err(ProviderError::DuplicateName(name)) => {
                if !self.options.update_existing {
                    return Err(SyncError::DuplicateRuleSet(name));
                }
                Ok((self.reuse_existing(&rule_set.name)?, false))
            }
            Err(ProviderError::ReservedName(name)) => {
                info!("rule set name {name} is reserved in destination, reusing it");
                Ok((self.reuse_existing(&rule_set.name)?, false))
            }
            Err(source) => Err(SyncError::Create {
                name: rule_set.name.clone(),
                source,
            }),
        }
    }

    fn reuse_existing(&mut self, name: &str) -> Result<String, SyncError> {
        let existing = self.find_destination(name)?;
        if self.options.update_existing {
            self.revoke_all(&existing)?;
        }
        Ok(existing.id)
    }

    fn find_destination(&self, name: &str) -> Result<RuleSet, SyncError> {
        let found = match self
            .destination
            .list_rule_sets(&RuleSetFilter::Names(vec![name.to_string()]))
        {
            Ok(found) => found,
            Err(ProviderError::NotFound { .. }) => Vec::new(),
            Err(source) => {
                return Err(SyncError::Lookup {
                    name: name.to_string(),
                    source,
                })
            }
        };
        found
            .into_iter()
            .find(|rs| rs.network_id == self.options.network_id)
            .ok_or_else(|| SyncError::MissingExisting {
                name: name.to_string(),
                network_id: self.options.network_id.clone(),
            })
    }

    fn revoke_all(&mut self, existing: &RuleSet) -> Result<(), SyncError> {
        for direction in Direction::ALL {
            let rules = existing.rules(direction);
            if rules.is_empty() {
                continue;
            }
            self.destination
                .revoke_rules(&existing.id, direction, rules)
                .map_err(|source| SyncError::Revoke {
                    name: existing.name.clone(),
                    direction,
                    source,
                })?;
        }
        info!(
            "revoked existing rules of {}({})",
            existing.name, existing.id
        );
        Ok(())
    }

    fn apply_inline_rules(
        &mut self,
        rule_set: &RuleSet,
        new_id: &str,
        fresh: bool,
    ) -> Result<usize, SyncError> {
        let mut applied = 0;
        for direction in Direction::ALL {
            let resolver = TargetResolver::new(
                &self.context.identity,
                &self.context.prefixes,
                self.options.reference_mode,
            );
            let owner = Owner {
                name: &rule_set.name,
                new_id,
            };
            let rules = resolver.rewrite_rules(
                owner,
                direction,
                rule_set.rules(direction),
                &mut self.context.summary.skipped,
            )?;
            if rules.is_empty() {
                continue;
            }
            if self.authorize(&rule_set.name, new_id, direction, &rules, fresh)? {
                applied += rules.len();
            }
        }
        Ok(applied)
    }

    fn apply_cross_references(&mut self, cross_group: &CrossGroupRules) -> Result<(), SyncError> {
        for direction in Direction::ALL {
            let resolver = TargetResolver::new(
                &self.context.identity,
                &self.context.prefixes,
                self.options.reference_mode,
            );
            let batches = resolve_cross_group(
                cross_group.get(direction),
                direction,
                &resolver,
                &mut self.context.summary.skipped,
            )?;

            for (new_id, rules) in batches {
                let fresh = self.context.fresh.contains(&new_id);
                let name = self.destination_name(&new_id);
                if self.authorize(&name, &new_id, direction, &rules, fresh)? {
                    info!(
                        "applied {} cross-group {direction} rules to {name}({new_id})",
                        rules.len()
                    );
                    self.context.summary.cross_reference_batches += 1;
                }
            }
        }
        self.enter(SyncPhase::CrossReferencesApplied);
        Ok(())
    }

    /// Append rules; fatal for a freshly created rule set, recorded otherwise.
    fn authorize(
        &mut self,
        name: &str,
        id: &str,
        direction: Direction,
        rules: &[Rule],
        fresh: bool,
    ) -> Result<bool, SyncError> {
        match self.destination.append_rules(id, direction, rules) {
            Ok(()) => Ok(true),
            Err(source) if fresh => Err(SyncError::AuthorizeFailed {
                name: name.to_string(),
                id: id.to_string(),
                direction,
                source,
            }),
            Err(source) => {
                let skip = SkippedReference {
                    rule_set: name.to_string(),
                    direction: Some(direction),
                    reference: id.to_string(),
                    reason: SkipReason::AuthorizeFailed,
                    detail: Some(source.to_string()),
                };
                warn!("skipping rules: {skip}");
                self.context.summary.skipped.push(skip);
                Ok(false)
            }
        }
    }

    fn destination_name(&self, new_id: &str) -> String {
        self.context
            .summary
            .rule_sets
            .iter()
            .find(|rs| rs.destination_id == new_id)
            .map(|rs| rs.name.clone())
            .unwrap_or_else(|| new_id.to_string())
    }
}
