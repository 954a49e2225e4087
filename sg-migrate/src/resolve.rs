//! Reference resolver.
//!
//! Rewrites rule targets from source identifiers to destination identifiers:
//!
//! - `Group` targets go old id -> name -> new id through the [`IdentityMap`];
//! - `SelfRef` targets take the owning rule set's new id;
//! - `PrefixList` targets are substituted directly from the [`PrefixMap`];
//! - `Cidr` targets are copied unchanged.
//!
//! A rule with any target that cannot be mapped is omitted as a whole and
//! every unmapped target is recorded as a [`SkippedReference`]. In strict
//! mode the first such miss aborts instead.

use std::collections::BTreeMap;

use ruleset_core::{Direction, Rule, Target};
use thiserror::Error;
use tracing::warn;

use crate::identity::{IdentityMap, LookupMiss, PrefixMap};
use crate::self_ref::bind_self_target;
use crate::summary::{SkipReason, SkippedReference};

/// How unresolvable references are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReferenceMode {
    /// Record the reference, drop its rule and keep going.
    #[default]
    Lenient,
    /// Abort on the first unresolvable reference.
    Strict,
}

/// Raised in strict mode for the first reference that cannot be mapped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unresolved reference: {0}")]
pub struct DanglingReference(pub SkippedReference);

/// Destination rule-set id -> rules to append to it.
pub type ResolvedRules = BTreeMap<String, Vec<Rule>>;

/// The rule set whose rules are being rewritten.
#[derive(Debug, Clone, Copy)]
pub struct Owner<'a> {
    pub name: &'a str,
    pub new_id: &'a str,
}

/// Rewrites targets against the identity and prefix maps of one run.
#[derive(Debug, Clone, Copy)]
pub struct TargetResolver<'a> {
    identity: &'a IdentityMap,
    prefixes: &'a PrefixMap,
    mode: ReferenceMode,
}

impl<'a> TargetResolver<'a> {
    pub fn new(identity: &'a IdentityMap, prefixes: &'a PrefixMap, mode: ReferenceMode) -> Self {
        Self {
            identity,
            prefixes,
            mode,
        }
    }

    /// Rewrite every rule of one owner and direction, omitting emptied rules.
    pub fn rewrite_rules(
        &self,
        owner: Owner<'_>,
        direction: Direction,
        rules: &[Rule],
        skipped: &mut Vec<SkippedReference>,
    ) -> Result<Vec<Rule>, DanglingReference> {
        let mut out = Vec::with_capacity(rules.len());
        for rule in rules {
            if let Some(rewritten) = self.rewrite_rule(owner, direction, rule, skipped)? {
                out.push(rewritten);
            }
        }
        Ok(out)
    }

    /// Rewrite one rule. Returns `None` when any target could not be mapped.
    pub fn rewrite_rule(
        &self,
        owner: Owner<'_>,
        direction: Direction,
        rule: &Rule,
        skipped: &mut Vec<SkippedReference>,
    ) -> Result<Option<Rule>, DanglingReference> {
        let mut targets = Vec::with_capacity(rule.targets.len());
        let mut unmapped = false;
        for target in &rule.targets {
            match self.rewrite_target(target, owner.new_id) {
                Ok(t) => targets.push(t),
                Err((reference, reason)) => {
                    unmapped = true;
                    self.record(
                        SkippedReference {
                            rule_set: owner.name.to_string(),
                            direction: Some(direction),
                            reference,
                            reason,
                            detail: Some("rule dropped".to_string()),
                        },
                        skipped,
                    )?
                }
            }
        }
        if unmapped || targets.is_empty() {
            return Ok(None);
        }
        Ok(Some(Rule {
            targets,
            ..rule.clone()
        }))
    }

    fn rewrite_target(
        &self,
        target: &Target,
        owner_new_id: &str,
    ) -> Result<Target, (String, SkipReason)> {
        match target {
            Target::Cidr { .. } | Target::SelfRef { .. } => {
                Ok(bind_self_target(target, owner_new_id))
            }
            Target::Group { id, description } => match self.identity.resolve(id) {
                Ok(new_id) => Ok(Target::Group {
                    id: new_id.to_string(),
                    description: description.clone(),
                }),
                Err(LookupMiss::UnknownSourceId) => {
                    Err((id.clone(), SkipReason::ReferenceNotCopied))
                }
                Err(LookupMiss::NotCreated(name)) => {
                    Err((format!("{id} ({name})"), SkipReason::ReferenceNotCreated))
                }
            },
            Target::PrefixList { id, description } => match self.prefixes.new_id(id) {
                Some(new_id) => Ok(Target::PrefixList {
                    id: new_id.to_string(),
                    description: description.clone(),
                }),
                None => Err((id.clone(), SkipReason::AddressListNotSynced)),
            },
        }
    }

    /// Log a miss, then record it or abort depending on the mode.
    pub fn record(
        &self,
        skip: SkippedReference,
        skipped: &mut Vec<SkippedReference>,
    ) -> Result<(), DanglingReference> {
        if self.mode == ReferenceMode::Strict {
            return Err(DanglingReference(skip));
        }
        warn!("skipping reference: {skip}");
        skipped.push(skip);
        Ok(())
    }
}

/// Resolve one side collection into per-destination rule batches.
///
/// Keys are the owners' source ids. Owners without a destination id are
/// skipped as a whole.
pub fn resolve_cross_group(
    side: &BTreeMap<String, Vec<Rule>>,
    direction: Direction,
    resolver: &TargetResolver<'_>,
    skipped: &mut Vec<SkippedReference>,
) -> Result<ResolvedRules, DanglingReference> {
    let mut out = ResolvedRules::new();
    for (old_id, rules) in side {
        let owner_miss = |reason| SkippedReference {
            rule_set: old_id.clone(),
            direction: Some(direction),
            reference: old_id.clone(),
            reason,
            detail: Some(format!("{} rules dropped", rules.len())),
        };
        let Some(name) = resolver.identity.name_of(old_id) else {
            resolver.record(owner_miss(SkipReason::OwnerNotCopied), skipped)?;
            continue;
        };
        let Some(new_id) = resolver.identity.new_id_for_name(name) else {
            let mut skip = owner_miss(SkipReason::OwnerNotCreated);
            skip.rule_set = name.to_string();
            resolver.record(skip, skipped)?;
            continue;
        };

        let owner = Owner {
            name,
            new_id,
        };
        let rewritten = resolver.rewrite_rules(owner, direction, rules, skipped)?;
        if !rewritten.is_empty() {
            out.entry(new_id.to_string()).or_default().extend(rewritten);
        }
    }
    Ok(out)
}
