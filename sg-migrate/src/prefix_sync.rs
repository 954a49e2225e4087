//! Prefix-list synchronizer.
//!
//! Clones every named address list referenced by the rules about to be
//! copied, so the resolver can substitute list identifiers directly. Runs to
//! completion before any rule set is created.

use std::collections::{BTreeMap, BTreeSet};

use ruleset_core::{AccessControlProvider, NewAddressList, Rule, RuleSet, Target};
use tracing::{info, warn};

use crate::filter::CrossGroupRules;
use crate::identity::PrefixMap;
use crate::resolve::{DanglingReference, ReferenceMode};
use crate::summary::{ClonedAddressList, SkipReason, SkippedReference};
use crate::tags::creation_tags;

/// Address-list ids referenced by `rules`, in first-seen order.
pub fn referenced_list_ids<'a>(rules: impl IntoIterator<Item = &'a Rule>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for target in rules.into_iter().flat_map(|r| &r.targets) {
        if let Target::PrefixList { id, .. } = target {
            if seen.insert(id.clone()) {
                out.push(id.clone());
            }
        }
    }
    out
}

/// Lists cloned and lists given up on during one synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixSyncReport {
    pub cloned: Vec<ClonedAddressList>,
    pub skipped: Vec<SkippedReference>,
}

/// Clone every referenced list not yet in `prefixes` from `source` to `destination`.
///
/// Failures are logged and reported as skipped; targets pointing at such a
/// list are later dropped by the resolver. In strict mode the first failure
/// aborts.
pub fn sync_address_lists(
    source: &dyn AccessControlProvider,
    destination: &mut dyn AccessControlProvider,
    rule_sets: &[RuleSet],
    cross_group: &CrossGroupRules,
    mode: ReferenceMode,
    prefixes: &mut PrefixMap,
) -> Result<PrefixSyncReport, DanglingReference> {
    let mut report = PrefixSyncReport::default();
    let owners = list_owners(rule_sets, cross_group);
    let inline = rule_sets
        .iter()
        .flat_map(|rs| rs.inbound.iter().chain(rs.outbound.iter()));
    let ids = referenced_list_ids(inline.chain(cross_group.rules()));

    for old_id in ids {
        if prefixes.contains(&old_id) {
            continue;
        }
        match clone_list(source, destination, &old_id) {
            Ok((list, new_id)) => {
                info!(
                    "cloned address list {} ({old_id} -> {new_id}, {} entries)",
                    list.name,
                    list.entries.len()
                );
                report.cloned.push(ClonedAddressList {
                    name: list.name.clone(),
                    source_id: old_id.clone(),
                    destination_id: new_id.clone(),
                    entries: list.entries.len(),
                });
                prefixes.insert(old_id, new_id);
            }
            Err(detail) => {
                let skip = SkippedReference {
                    rule_set: owners.get(&old_id).cloned().unwrap_or_default(),
                    direction: None,
                    reference: old_id.clone(),
                    reason: SkipReason::AddressListNotSynced,
                    detail: Some(detail),
                };
                if mode == ReferenceMode::Strict {
                    return Err(DanglingReference(skip));
                }
                warn!("failed to clone address list {old_id}: {skip}");
                report.skipped.push(skip);
            }
        }
    }
    Ok(report)
}

fn clone_list(
    source: &dyn AccessControlProvider,
    destination: &mut dyn AccessControlProvider,
    old_id: &str,
) -> Result<(ruleset_core::NamedAddressList, String), String> {
    let list = source
        .list_named_address_lists(&[old_id.to_string()])
        .map_err(|e| format!("fetch failed: {e}"))?
        .into_iter()
        .next()
        .ok_or_else(|| "source returned no list".to_string())?;
    let request = NewAddressList::cloned_from(&list, creation_tags(&BTreeMap::new()));
    let new_id = destination
        .create_named_address_list(&request)
        .map_err(|e| format!("create failed: {e}"))?;
    Ok((list, new_id))
}

/// First rule-set name referencing each list, for skip reports.
fn list_owners(rule_sets: &[RuleSet], cross_group: &CrossGroupRules) -> BTreeMap<String, String> {
    let mut owners = BTreeMap::new();
    let names: BTreeMap<&str, &str> = rule_sets
        .iter()
        .map(|rs| (rs.id.as_str(), rs.name.as_str()))
        .collect();
    for rs in rule_sets {
        for id in referenced_list_ids(rs.inbound.iter().chain(rs.outbound.iter())) {
            owners.entry(id).or_insert_with(|| rs.name.clone());
        }
    }
    for (owner_id, rules) in cross_group.inbound.iter().chain(cross_group.outbound.iter()) {
        let owner = names.get(owner_id.as_str()).copied().unwrap_or(owner_id.as_str());
        for id in referenced_list_ids(rules) {
            owners.entry(id).or_insert_with(|| owner.to_string());
        }
    }
    owners
}
