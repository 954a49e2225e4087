//! Run-scoped identifier tables.

use std::collections::BTreeMap;

/// Why an old rule-set identifier could not be mapped to a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupMiss {
    /// The identifier never appeared among the copied source rule sets.
    UnknownSourceId,
    /// The name is known but nothing was created under it in the destination.
    NotCreated(String),
}

/// Old id -> name -> new id tables for rule sets.
///
/// Names are the stable key across environments: the source side is
/// recorded when a rule set is processed, the destination side once the
/// destination has assigned (or handed back) an identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMap {
    id_to_name: BTreeMap<String, String>,
    name_to_new_id: BTreeMap<String, String>,
}

impl IdentityMap {
    pub fn record_source(&mut self, old_id: impl Into<String>, name: impl Into<String>) {
        self.id_to_name.insert(old_id.into(), name.into());
    }

    pub fn record_destination(&mut self, name: impl Into<String>, new_id: impl Into<String>) {
        self.name_to_new_id.insert(name.into(), new_id.into());
    }

    pub fn name_of(&self, old_id: &str) -> Option<&str> {
        self.id_to_name.get(old_id).map(String::as_str)
    }

    pub fn new_id_for_name(&self, name: &str) -> Option<&str> {
        self.name_to_new_id.get(name).map(String::as_str)
    }

    /// Map an old identifier to its destination identifier through its name.
    pub fn resolve(&self, old_id: &str) -> Result<&str, LookupMiss> {
        let name = self.name_of(old_id).ok_or(LookupMiss::UnknownSourceId)?;
        self.new_id_for_name(name)
            .ok_or_else(|| LookupMiss::NotCreated(name.to_string()))
    }
}

/// Old address-list id -> id of its clone in the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixMap {
    lists: BTreeMap<String, String>,
}

impl PrefixMap {
    pub fn insert(&mut self, old_id: impl Into<String>, new_id: impl Into<String>) {
        self.lists.insert(old_id.into(), new_id.into());
    }

    pub fn contains(&self, old_id: &str) -> bool {
        self.lists.contains_key(old_id)
    }

    pub fn new_id(&self, old_id: &str) -> Option<&str> {
        self.lists.get(old_id).map(String::as_str)
    }
}
