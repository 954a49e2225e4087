use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::model::{AddressFamily, Direction, ListEntry, NamedAddressList, Rule, RuleSet};

/// Which rule sets a listing call should return.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RuleSetFilter {
    #[default]
    All,
    Ids(Vec<String>),
    Names(Vec<String>),
}

/// Request to create an empty rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRuleSet {
    pub name: String,
    pub description: String,
    pub network_id: String,
    pub tags: BTreeMap<String, String>,
}

/// Request to create a named address list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAddressList {
    pub name: String,
    pub family: AddressFamily,
    pub max_entries: u32,
    pub entries: Vec<ListEntry>,
    pub tags: BTreeMap<String, String>,
}

impl NewAddressList {
    /// Request reproducing `list` verbatim under new tags.
    pub fn cloned_from(list: &NamedAddressList, tags: BTreeMap<String, String>) -> Self {
        Self {
            name: list.name.clone(),
            family: list.family,
            max_entries: list.max_entries,
            entries: list.entries.clone(),
            tags,
        }
    }
}

/// Errors reported by an access-control provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The target network does not exist.
    #[error("network {0:?} not found")]
    NetworkNotFound(String),
    /// A rule set with this name already exists in the network.
    #[error("rule set {0:?} already exists")]
    DuplicateName(String),
    /// The name is reserved for the provider-managed rule set.
    #[error("rule set name {0:?} is reserved")]
    ReservedName(String),
    /// A referenced object does not exist.
    #[error("{kind} {id:?} not found")]
    NotFound { kind: &'static str, id: String },
    /// A listing filter could not be interpreted.
    #[error("malformed filter: {0}")]
    MalformedFilter(String),
    /// The provider refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),
    /// Temporary failure; the same call may succeed later.
    #[error("transient provider failure: {0}")]
    Transient(String),
    /// The call did not complete in time.
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// Whether retrying the same call can help.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_) | ProviderError::Timeout(_))
    }
}

/// Remote service holding rule sets and named address lists for one environment.
pub trait AccessControlProvider {
    fn list_rule_sets(&self, filter: &RuleSetFilter) -> Result<Vec<RuleSet>, ProviderError>;

    /// Create an empty rule set and return its new identifier.
    fn create_rule_set(&mut self, request: &NewRuleSet) -> Result<String, ProviderError>;

    fn append_rules(
        &mut self,
        rule_set_id: &str,
        direction: Direction,
        rules: &[Rule],
    ) -> Result<(), ProviderError>;

    fn revoke_rules(
        &mut self,
        rule_set_id: &str,
        direction: Direction,
        rules: &[Rule],
    ) -> Result<(), ProviderError>;

    fn list_named_address_lists(
        &self,
        ids: &[String],
    ) -> Result<Vec<NamedAddressList>, ProviderError>;

    /// Create a named address list and return its new identifier.
    fn create_named_address_list(&mut self, request: &NewAddressList)
        -> Result<String, ProviderError>;
}

impl<P: AccessControlProvider + ?Sized> AccessControlProvider for &mut P {
    fn list_rule_sets(&self, filter: &RuleSetFilter) -> Result<Vec<RuleSet>, ProviderError> {
        (**self).list_rule_sets(filter)
    }

    fn create_rule_set(&mut self, request: &NewRuleSet) -> Result<String, ProviderError> {
        (**self).create_rule_set(request)
    }

    fn append_rules(
        &mut self,
        rule_set_id: &str,
        direction: Direction,
        rules: &[Rule],
    ) -> Result<(), ProviderError> {
        (**self).append_rules(rule_set_id, direction, rules)
    }

    fn revoke_rules(
        &mut self,
        rule_set_id: &str,
        direction: Direction,
        rules: &[Rule],
    ) -> Result<(), ProviderError> {
        (**self).revoke_rules(rule_set_id, direction, rules)
    }

    fn list_named_address_lists(
        &self,
        ids: &[String],
    ) -> Result<Vec<NamedAddressList>, ProviderError> {
        (**self).list_named_address_lists(ids)
    }

    fn create_named_address_list(
        &mut self,
        request: &NewAddressList,
    ) -> Result<String, ProviderError> {
        (**self).create_named_address_list(request)
    }
}
