use std::fmt::{self, Display, Formatter};

use colored::Colorize;
use ruleset_core::Direction;
use serde::Serialize;

use crate::filter::FilterStats;

/// Why part of a rule was not applied in the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The owning rule set was not among the copied source rule sets.
    OwnerNotCopied,
    /// The owning rule set has no destination identifier.
    OwnerNotCreated,
    /// The referenced rule set was not among the copied source rule sets.
    ReferenceNotCopied,
    /// The referenced rule set has no destination identifier.
    ReferenceNotCreated,
    /// The referenced address list was not cloned into the destination.
    AddressListNotSynced,
    /// The destination refused rules for a rule set that already existed.
    AuthorizeFailed,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::OwnerNotCopied => "owning rule set not copied",
            SkipReason::OwnerNotCreated => "owning rule set not created in destination",
            SkipReason::ReferenceNotCopied => "referenced rule set not copied",
            SkipReason::ReferenceNotCreated => "referenced rule set not created in destination",
            SkipReason::AddressListNotSynced => "address list not synced",
            SkipReason::AuthorizeFailed => "destination rejected rules",
        };
        f.write_str(text)
    }
}

/// One reference (or batch of rules) left out of the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedReference {
    /// Owning rule set, by name when known, else by source id.
    pub rule_set: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    /// Identifier that could not be carried over.
    pub reference: String,
    pub reason: SkipReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Display for SkippedReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rule_set)?;
        if let Some(direction) = self.direction {
            write!(f, " {direction}")?;
        }
        write!(f, " -> {}: {}", self.reference, self.reason)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedRuleSet {
    pub name: String,
    pub source_id: String,
    pub destination_id: String,
    /// An existing destination rule set was reused instead of created.
    pub reused: bool,
    /// Inline rules applied right after creation.
    pub rules: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClonedAddressList {
    pub name: String,
    pub source_id: String,
    pub destination_id: String,
    pub entries: usize,
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub dry_run: bool,
    pub filter: FilterStats,
    pub rule_sets: Vec<CreatedRuleSet>,
    pub address_lists: Vec<ClonedAddressList>,
    pub cross_reference_batches: usize,
    /// Rule set names excluded by configuration.
    pub excluded: Vec<String>,
    pub skipped: Vec<SkippedReference>,
}

impl SyncSummary {
    /// True when nothing was skipped.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn created_count(&self) -> usize {
        self.rule_sets.iter().filter(|r| !r.reused).count()
    }

    pub fn reused_count(&self) -> usize {
        self.rule_sets.iter().filter(|r| r.reused).count()
    }
}

/// Render a summary for terminal output.
pub fn render_summary(summary: &SyncSummary) -> String {
    let mut out = Vec::new();
    let header = format!(
        "sync_summary dry_run={} created={} reused={} address_lists={} cross_ref_batches={} skipped={}",
        summary.dry_run,
        summary.created_count(),
        summary.reused_count(),
        summary.address_lists.len(),
        summary.cross_reference_batches,
        summary.skipped.len()
    );
    out.push(header.cyan().to_string());
    out.push(format!(
        "filter dropped_rule_sets={} dropped_wide_open={} discarded_default_refs={} extracted={}",
        summary.filter.dropped_rule_sets,
        summary.filter.dropped_wide_open,
        summary.filter.discarded_default_refs,
        summary.filter.extracted
    ));

    out.push("rule_sets".to_string());
    if summary.rule_sets.is_empty() {
        out.push("- none".to_string());
    }
    for rs in &summary.rule_sets {
        let verb = if rs.reused { "reused" } else { "created" };
        out.push(format!(
            "- {verb} {} {} -> {} rules={}",
            rs.name, rs.source_id, rs.destination_id, rs.rules
        ));
    }

    if !summary.address_lists.is_empty() {
        out.push("address_lists".to_string());
        for list in &summary.address_lists {
            out.push(format!(
                "- {} {} -> {} entries={}",
                list.name, list.source_id, list.destination_id, list.entries
            ));
        }
    }

    for name in &summary.excluded {
        out.push(format!("- excluded {name}").dimmed().to_string());
    }

    if !summary.skipped.is_empty() {
        out.push("skipped".to_string());
        for skip in &summary.skipped {
            out.push(format!("- [warning] {skip}").yellow().to_string());
        }
    }
    out.join("\n")
}
