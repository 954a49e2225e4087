//! Rule set and named address list primitives shared by migration tools.

pub mod memory;
pub mod model;
pub mod provider;
pub mod snapshot;

pub use memory::{Environment, MemoryProvider};
pub use model::{
    AddressFamily, Direction, ListEntry, NamedAddressList, PortRange, Rule, RuleSet, Target,
    DEFAULT_RULE_SET_NAME,
};
pub use provider::{
    AccessControlProvider, NewAddressList, NewRuleSet, ProviderError, RuleSetFilter,
};
pub use snapshot::{load_snapshot, parse_snapshot, save_snapshot, SnapshotError};
