use ruleset_core::{
    AccessControlProvider, Direction, NamedAddressList, NewAddressList, NewRuleSet,
    ProviderError, Rule, RuleSet, RuleSetFilter, DEFAULT_RULE_SET_NAME,
};
use serde::Serialize;

/// A mutating call the destination would have received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum PlannedCall {
    CreateRuleSet {
        name: String,
        network_id: String,
        assigned_id: String,
    },
    AppendRules {
        rule_set_id: String,
        direction: Direction,
        rules: usize,
    },
    RevokeRules {
        rule_set_id: String,
        direction: Direction,
        rules: usize,
    },
    CreateAddressList {
        name: String,
        entries: usize,
        assigned_id: String,
    },
}

impl PlannedCall {
    pub fn describe(&self) -> String {
        match self {
            PlannedCall::CreateRuleSet {
                name,
                network_id,
                assigned_id,
            } => format!("create rule set {name} in {network_id} as {assigned_id}"),
            PlannedCall::AppendRules {
                rule_set_id,
                direction,
                rules,
            } => format!("append {rules} {direction} rules to {rule_set_id}"),
            PlannedCall::RevokeRules {
                rule_set_id,
                direction,
                rules,
            } => format!("revoke {rules} {direction} rules from {rule_set_id}"),
            PlannedCall::CreateAddressList {
                name,
                entries,
                assigned_id,
            } => format!("create address list {name} ({entries} entries) as {assigned_id}"),
        }
    }
}

/// Destination wrapper that plans mutations instead of performing them.
///
/// Reads go to the wrapped provider. Creates hand out placeholder ids so the
/// rest of the pipeline can run unchanged.
#[derive(Debug)]
pub struct DryRunProvider<P> {
    inner: P,
    planned: Vec<PlannedCall>,
    next_placeholder: u64,
}

impl<P: AccessControlProvider> DryRunProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            planned: Vec::new(),
            next_placeholder: 1,
        }
    }

    pub fn planned(&self) -> &[PlannedCall] {
        &self.planned
    }

    pub fn into_planned(self) -> Vec<PlannedCall> {
        self.planned
    }

    fn has_rule_set(&self, name: &str, network_id: &str) -> Result<bool, ProviderError> {
        let found = match self
            .inner
            .list_rule_sets(&RuleSetFilter::Names(vec![name.to_string()]))
        {
            Ok(found) => found,
            Err(ProviderError::NotFound { .. }) => Vec::new(),
            Err(err) => return Err(err),
        };
        Ok(found.iter().any(|rs| rs.network_id == network_id))
    }

    fn placeholder(&mut self, kind: &str) -> String {
        let n = self.next_placeholder;
        self.next_placeholder += 1;
        format!("dryrun-{kind}-{n}")
    }
}

impl<P: AccessControlProvider> AccessControlProvider for DryRunProvider<P> {
    fn list_rule_sets(&self, filter: &RuleSetFilter) -> Result<Vec<RuleSet>, ProviderError> {
        self.inner.list_rule_sets(filter)
    }

    fn create_rule_set(&mut self, request: &NewRuleSet) -> Result<String, ProviderError> {
        // Every network carries a default rule set.
        if !self.has_rule_set(DEFAULT_RULE_SET_NAME, &request.network_id)? {
            return Err(ProviderError::NetworkNotFound(request.network_id.clone()));
        }
        if request.name == DEFAULT_RULE_SET_NAME {
            return Err(ProviderError::ReservedName(request.name.clone()));
        }
        if self.has_rule_set(&request.name, &request.network_id)? {
            return Err(ProviderError::DuplicateName(request.name.clone()));
        }

        let assigned_id = self.placeholder("sg");
        self.planned.push(PlannedCall::CreateRuleSet {
            name: request.name.clone(),
            network_id: request.network_id.clone(),
            assigned_id: assigned_id.clone(),
        });
        Ok(assigned_id)
    }

    fn append_rules(
        &mut self,
        rule_set_id: &str,
        direction: Direction,
        rules: &[Rule],
    ) -> Result<(), ProviderError> {
        self.planned.push(PlannedCall::AppendRules {
            rule_set_id: rule_set_id.to_string(),
            direction,
            rules: rules.len(),
        });
        Ok(())
    }

    fn revoke_rules(
        &mut self,
        rule_set_id: &str,
        direction: Direction,
        rules: &[Rule],
    ) -> Result<(), ProviderError> {
        self.planned.push(PlannedCall::RevokeRules {
            rule_set_id: rule_set_id.to_string(),
            direction,
            rules: rules.len(),
        });
        Ok(())
    }

    fn list_named_address_lists(
        &self,
        ids: &[String],
    ) -> Result<Vec<NamedAddressList>, ProviderError> {
        self.inner.list_named_address_lists(ids)
    }

    fn create_named_address_list(
        &mut self,
        request: &NewAddressList,
    ) -> Result<String, ProviderError> {
        let assigned_id = self.placeholder("pl");
        self.planned.push(PlannedCall::CreateAddressList {
            name: request.name.clone(),
            entries: request.entries.len(),
            assigned_id: assigned_id.clone(),
        });
        Ok(assigned_id)
    }
}
