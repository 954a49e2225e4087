use ruleset_core::{AccessControlProvider, Direction, ProviderError, RuleSetFilter};
use serde::Serialize;
use tracing::{info, warn};

/// A rule set whose rules were revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WipedRuleSet {
    pub name: String,
    pub id: String,
    pub rules: usize,
}

/// A direction that could not be revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WipeFailure {
    pub name: String,
    pub id: String,
    pub direction: Direction,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WipeReport {
    pub revoked: Vec<WipedRuleSet>,
    pub failures: Vec<WipeFailure>,
}

impl WipeReport {
    pub fn revoked_rules(&self) -> usize {
        self.revoked.iter().map(|w| w.rules).sum()
    }
}

/// Revoke every rule of every destination rule set, optionally limited to
/// one network. Revocation failures are collected, not fatal.
pub fn wipe_rule_sets(
    destination: &mut dyn AccessControlProvider,
    network_id: Option<&str>,
) -> Result<WipeReport, ProviderError> {
    let rule_sets = destination.list_rule_sets(&RuleSetFilter::All)?;
    let mut report = WipeReport::default();

    for rule_set in rule_sets
        .iter()
        .filter(|rs| network_id.map_or(true, |network| rs.network_id == network))
    {
        let mut revoked = 0;
        for direction in Direction::ALL {
            let rules = rule_set.rules(direction);
            if rules.is_empty() {
                continue;
            }
            match destination.revoke_rules(&rule_set.id, direction, rules) {
                Ok(()) => revoked += rules.len(),
                Err(err) => {
                    warn!(
                        "failed to revoke {direction} rules of {}({}): {err}",
                        rule_set.name, rule_set.id
                    );
                    report.failures.push(WipeFailure {
                        name: rule_set.name.clone(),
                        id: rule_set.id.clone(),
                        direction,
                        error: err.to_string(),
                    });
                }
            }
        }
        if revoked > 0 {
            info!("revoked {revoked} rules of {}({})", rule_set.name, rule_set.id);
            report.revoked.push(WipedRuleSet {
                name: rule_set.name.clone(),
                id: rule_set.id.clone(),
                rules: revoked,
            });
        }
    }
    Ok(report)
}
