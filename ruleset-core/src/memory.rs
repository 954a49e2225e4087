use serde::{Deserialize, Serialize};

use crate::model::{
    Direction, NamedAddressList, Rule, RuleSet, Target, DEFAULT_RULE_SET_NAME,
};
use crate::provider::{
    AccessControlProvider, NewAddressList, NewRuleSet, ProviderError, RuleSetFilter,
};

const RULE_SET_ID_PREFIX: &str = "sg-";
const ADDRESS_LIST_ID_PREFIX: &str = "pl-";

fn default_next_id() -> u64 {
    1
}

/// Complete state of one environment: networks, rule sets and address lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub rule_sets: Vec<RuleSet>,
    #[serde(default)]
    pub address_lists: Vec<NamedAddressList>,
    /// Counter used for the next identifier handed out.
    #[serde(default = "default_next_id")]
    pub next_id: u64,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(default_next_id())
    }
}

impl Environment {
    /// Empty environment whose first generated identifier uses `next_id`.
    pub fn new(next_id: u64) -> Self {
        Self {
            networks: Vec::new(),
            rule_sets: Vec::new(),
            address_lists: Vec::new(),
            next_id,
        }
    }

    /// Add a network together with its provider-managed `default` rule set.
    ///
    /// The default rule set admits all traffic from its own members and
    /// allows all outbound traffic, as cloud providers seed it.
    pub fn with_network(mut self, network_id: impl Into<String>) -> Self {
        let network_id = network_id.into();
        let id = self.allocate(RULE_SET_ID_PREFIX);
        let mut default = RuleSet::new(id.clone(), DEFAULT_RULE_SET_NAME, network_id.clone());
        default.description = "default rule set".to_string();
        default.inbound = vec![Rule::all_traffic(vec![Target::group(id)])];
        default.outbound = vec![Rule::all_traffic(vec![Target::cidr("0.0.0.0/0")])];
        self.networks.push(network_id);
        self.rule_sets.push(default);
        self
    }

    pub fn with_rule_set(mut self, rule_set: RuleSet) -> Self {
        self.rule_sets.push(rule_set);
        self
    }

    pub fn with_address_list(mut self, list: NamedAddressList) -> Self {
        self.address_lists.push(list);
        self
    }

    pub fn rule_set(&self, id: &str) -> Option<&RuleSet> {
        self.rule_sets.iter().find(|rs| rs.id == id)
    }

    /// Rule set with `name` inside `network_id`.
    pub fn rule_set_named(&self, network_id: &str, name: &str) -> Option<&RuleSet> {
        self.rule_sets
            .iter()
            .find(|rs| rs.network_id == network_id && rs.name == name)
    }

    pub fn address_list(&self, id: &str) -> Option<&NamedAddressList> {
        self.address_lists.iter().find(|l| l.id == id)
    }

    fn allocate(&mut self, prefix: &str) -> String {
        let id = format!("{prefix}{}", self.next_id);
        self.next_id += 1;
        id
    }
}

/// Provider that keeps a whole environment in memory.
///
/// Applies the same validation a cloud control plane would, so the sync
/// pipeline can be exercised end to end against snapshot files.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    env: Environment,
}

impl MemoryProvider {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    fn rule_set_mut(&mut self, id: &str) -> Result<&mut RuleSet, ProviderError> {
        self.env
            .rule_sets
            .iter_mut()
            .find(|rs| rs.id == id)
            .ok_or_else(|| not_found("rule set", id))
    }

    fn validate_targets(&self, rules: &[Rule]) -> Result<(), ProviderError> {
        for target in rules.iter().flat_map(|r| &r.targets) {
            match target {
                Target::SelfRef { .. } => {
                    return Err(ProviderError::Rejected(
                        "rule still carries an unresolved self reference".to_string(),
                    ));
                }
                Target::Group { id, .. } if self.env.rule_set(id).is_none() => {
                    return Err(not_found("rule set", id));
                }
                Target::PrefixList { id, .. } if self.env.address_list(id).is_none() => {
                    return Err(not_found("address list", id));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl AccessControlProvider for MemoryProvider {
    fn list_rule_sets(&self, filter: &RuleSetFilter) -> Result<Vec<RuleSet>, ProviderError> {
        match filter {
            RuleSetFilter::All => Ok(self.env.rule_sets.clone()),
            RuleSetFilter::Ids(ids) => ids
                .iter()
                .map(|id| {
                    if !is_well_formed_id(id) {
                        return Err(ProviderError::MalformedFilter(format!(
                            "invalid rule set id {id:?}"
                        )));
                    }
                    self.env
                        .rule_set(id)
                        .cloned()
                        .ok_or_else(|| not_found("rule set", id))
                })
                .collect(),
            RuleSetFilter::Names(names) => {
                let mut out = Vec::new();
                for name in names {
                    if name.trim().is_empty() {
                        return Err(ProviderError::MalformedFilter(
                            "empty rule set name".to_string(),
                        ));
                    }
                    let matches = self
                        .env
                        .rule_sets
                        .iter()
                        .filter(|rs| &rs.name == name)
                        .cloned()
                        .collect::<Vec<_>>();
                    if matches.is_empty() {
                        return Err(not_found("rule set", name));
                    }
                    out.extend(matches);
                }
                Ok(out)
            }
        }
    }

    fn create_rule_set(&mut self, request: &NewRuleSet) -> Result<String, ProviderError> {
        if !self.env.networks.contains(&request.network_id) {
            return Err(ProviderError::NetworkNotFound(request.network_id.clone()));
        }
        if request.name == DEFAULT_RULE_SET_NAME {
            return Err(ProviderError::ReservedName(request.name.clone()));
        }
        if self
            .env
            .rule_set_named(&request.network_id, &request.name)
            .is_some()
        {
            return Err(ProviderError::DuplicateName(request.name.clone()));
        }

        let id = self.env.allocate(RULE_SET_ID_PREFIX);
        let mut rule_set = RuleSet::new(id.clone(), &request.name, &request.network_id);
        rule_set.description = request.description.clone();
        rule_set.tags = request.tags.clone();
        self.env.rule_sets.push(rule_set);
        Ok(id)
    }

    fn append_rules(
        &mut self,
        rule_set_id: &str,
        direction: Direction,
        rules: &[Rule],
    ) -> Result<(), ProviderError> {
        self.validate_targets(rules)?;
        let rule_set = self.rule_set_mut(rule_set_id)?;
        let existing = rule_set.rules_mut(direction);
        if let Some(dupe) = rules.iter().find(|r| existing.contains(r)) {
            return Err(ProviderError::Rejected(format!(
                "duplicate {direction} rule for protocol {} on {rule_set_id}",
                dupe.protocol
            )));
        }
        existing.extend(rules.iter().cloned());
        Ok(())
    }

    fn revoke_rules(
        &mut self,
        rule_set_id: &str,
        direction: Direction,
        rules: &[Rule],
    ) -> Result<(), ProviderError> {
        let rule_set = self.rule_set_mut(rule_set_id)?;
        let existing = rule_set.rules_mut(direction);
        if rules.iter().any(|r| !existing.contains(r)) {
            return Err(not_found("rule", rule_set_id));
        }
        existing.retain(|r| !rules.contains(r));
        Ok(())
    }

    fn list_named_address_lists(
        &self,
        ids: &[String],
    ) -> Result<Vec<NamedAddressList>, ProviderError> {
        ids.iter()
            .map(|id| {
                self.env
                    .address_list(id)
                    .cloned()
                    .ok_or_else(|| not_found("address list", id))
            })
            .collect()
    }

    fn create_named_address_list(
        &mut self,
        request: &NewAddressList,
    ) -> Result<String, ProviderError> {
        if request.entries.len() > request.max_entries as usize {
            return Err(ProviderError::Rejected(format!(
                "address list {:?} has {} entries but allows {}",
                request.name,
                request.entries.len(),
                request.max_entries
            )));
        }
        let id = self.env.allocate(ADDRESS_LIST_ID_PREFIX);
        self.env.address_lists.push(NamedAddressList {
            id: id.clone(),
            name: request.name.clone(),
            family: request.family,
            max_entries: request.max_entries,
            entries: request.entries.clone(),
            tags: request.tags.clone(),
        });
        Ok(id)
    }
}

fn is_well_formed_id(id: &str) -> bool {
    id.strip_prefix(RULE_SET_ID_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn not_found(kind: &'static str, id: &str) -> ProviderError {
    ProviderError::NotFound {
        kind,
        id: id.to_string(),
    }
}
