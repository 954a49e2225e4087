use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Name of the network-wide rule set every provider seeds on its own.
pub const DEFAULT_RULE_SET_NAME: &str = "default";

/// CIDRs that match every address of their family.
const UNIVERSAL_CIDRS: [&str; 2] = ["0.0.0.0/0", "::/0"];

/// Traffic direction a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    /// Both directions, inbound first.
    pub const ALL: [Direction; 2] = [Direction::Inbound, Direction::Outbound];
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => f.write_str("inbound"),
            Direction::Outbound => f.write_str("outbound"),
        }
    }
}

/// A named collection of inbound and outbound access rules (a security group).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Provider-assigned identifier, local to one environment.
    pub id: String,
    /// Human name, unique within a network.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Owning network. Empty for account-wide rule sets.
    #[serde(default)]
    pub network_id: String,
    #[serde(default)]
    pub inbound: Vec<Rule>,
    #[serde(default)]
    pub outbound: Vec<Rule>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl RuleSet {
    /// Create an empty rule set.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        network_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            network_id: network_id.into(),
            inbound: Vec::new(),
            outbound: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    /// Rules for one direction.
    pub fn rules(&self, direction: Direction) -> &[Rule] {
        match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        }
    }

    /// Mutable rules for one direction.
    pub fn rules_mut(&mut self, direction: Direction) -> &mut Vec<Rule> {
        match direction {
            Direction::Inbound => &mut self.inbound,
            Direction::Outbound => &mut self.outbound,
        }
    }

    /// Whether this is the provider-managed `default` rule set.
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_RULE_SET_NAME
    }

    /// Total number of rules in both directions.
    pub fn rule_count(&self) -> usize {
        self.inbound.len() + self.outbound.len()
    }
}

/// Inclusive port range. ICMP rules reuse the fields for type and code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub from: i32,
    pub to: i32,
}

/// One access rule: protocol, optional port range and the peers it admits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Protocol name or number. `-1` and `all` mean every protocol.
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<PortRange>,
    pub targets: Vec<Target>,
}

impl Rule {
    pub fn new(protocol: impl Into<String>, ports: Option<PortRange>, targets: Vec<Target>) -> Self {
        Self {
            protocol: protocol.into(),
            ports,
            targets,
        }
    }

    /// TCP rule for a single port.
    pub fn tcp(port: i32, targets: Vec<Target>) -> Self {
        Self::new("tcp", Some(PortRange { from: port, to: port }), targets)
    }

    /// Rule covering every protocol and port.
    pub fn all_traffic(targets: Vec<Target>) -> Self {
        Self::new("-1", None, targets)
    }

    pub fn is_all_protocols(&self) -> bool {
        matches!(self.protocol.as_str(), "-1" | "all")
    }

    /// All protocols towards the whole address space.
    pub fn is_wide_open(&self) -> bool {
        self.is_all_protocols() && self.targets.iter().any(Target::is_universal)
    }

    /// Whether any target points at another rule set (not the owner).
    pub fn references_foreign_group(&self) -> bool {
        self.targets
            .iter()
            .any(|t| matches!(t, Target::Group { .. }))
    }

    /// Whether any target points at a rule set, the owner included.
    pub fn references_any_group(&self) -> bool {
        self.targets
            .iter()
            .any(|t| matches!(t, Target::Group { .. } | Target::SelfRef { .. }))
    }
}

/// The peer side of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// Literal address range.
    Cidr {
        cidr: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// The rule set that owns the rule, whatever identifier it ends up with.
    SelfRef {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// Another rule set, by identifier.
    Group {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// A named address list, by identifier.
    PrefixList {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl Target {
    pub fn cidr(cidr: impl Into<String>) -> Self {
        Target::Cidr {
            cidr: cidr.into(),
            description: None,
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Target::Group {
            id: id.into(),
            description: None,
        }
    }

    pub fn prefix_list(id: impl Into<String>) -> Self {
        Target::PrefixList {
            id: id.into(),
            description: None,
        }
    }

    pub fn self_ref() -> Self {
        Target::SelfRef { description: None }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Target::Cidr { description, .. }
            | Target::SelfRef { description }
            | Target::Group { description, .. }
            | Target::PrefixList { description, .. } => description.as_deref(),
        }
    }

    pub fn is_universal(&self) -> bool {
        match self {
            Target::Cidr { cidr, .. } => UNIVERSAL_CIDRS.contains(&cidr.trim()),
            _ => false,
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Target::Cidr { cidr, .. } => f.write_str(cidr),
            Target::SelfRef { .. } => f.write_str("self"),
            Target::Group { id, .. } | Target::PrefixList { id, .. } => f.write_str(id),
        }
    }
}

/// Address family of a named address list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressFamily {
    IPv4,
    IPv6,
}

impl Display for AddressFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::IPv4 => f.write_str("IPv4"),
            AddressFamily::IPv6 => f.write_str("IPv6"),
        }
    }
}

/// One CIDR entry of a named address list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub cidr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ListEntry {
    pub fn new(cidr: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            cidr: cidr.into(),
            description: Some(description.into()),
        }
    }
}

/// A reusable, named list of CIDR ranges (a managed prefix list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedAddressList {
    pub id: String,
    pub name: String,
    pub family: AddressFamily,
    pub max_entries: u32,
    #[serde(default)]
    pub entries: Vec<ListEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}
