//! Self-reference tagging.
//!
//! A rule that admits traffic from its own rule set carries that rule set's
//! source identifier, which means nothing in the destination and cannot be
//! resolved before the destination assigns a new one. Such targets are
//! tagged as [`Target::SelfRef`] up front and bound to the new identifier
//! right after creation.

use ruleset_core::{Rule, RuleSet, Target};

/// Replace every target naming `rule_set`'s own identifier with `SelfRef`.
pub fn tag_self_references(rule_set: RuleSet) -> RuleSet {
    let own_id = rule_set.id.clone();
    let tag = |rules: Vec<Rule>| -> Vec<Rule> {
        rules
            .into_iter()
            .map(|rule| Rule {
                targets: rule
                    .targets
                    .into_iter()
                    .map(|target| match target {
                        Target::Group { id, description } if id == own_id => {
                            Target::SelfRef { description }
                        }
                        other => other,
                    })
                    .collect(),
                ..rule
            })
            .collect()
    };
    RuleSet {
        inbound: tag(rule_set.inbound),
        outbound: tag(rule_set.outbound),
        ..rule_set
    }
}

/// Bind one target to the owner's destination identifier if it is a `SelfRef`.
pub fn bind_self_target(target: &Target, new_id: &str) -> Target {
    match target {
        Target::SelfRef { description } => Target::Group {
            id: new_id.to_string(),
            description: description.clone(),
        },
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use ruleset_core::{Rule, RuleSet, Target};

    use super::{bind_self_target, tag_self_references};

    #[test]
    fn tags_only_own_identifier() {
        let mut rs = RuleSet::new("sg-1", "app", "vpc-1");
        rs.inbound.push(Rule::tcp(
            80,
            vec![Target::group("sg-1"), Target::group("sg-2")],
        ));
        rs.outbound.push(Rule::all_traffic(vec![Target::group("sg-1")]));

        let tagged = tag_self_references(rs);
        assert_eq!(
            tagged.inbound[0].targets,
            vec![Target::self_ref(), Target::group("sg-2")]
        );
        assert_eq!(tagged.outbound[0].targets, vec![Target::self_ref()]);
    }

    #[test]
    fn tagging_twice_changes_nothing() {
        let mut rs = RuleSet::new("sg-1", "app", "vpc-1");
        rs.inbound.push(Rule::tcp(80, vec![Target::group("sg-1")]));
        let once = tag_self_references(rs);
        assert_eq!(tag_self_references(once.clone()), once);
    }

    #[test]
    fn binds_self_to_new_identifier_and_keeps_description() {
        let peers = Target::SelfRef {
            description: Some("peers".to_string()),
        };
        assert_eq!(
            bind_self_target(&peers, "sg-101"),
            Target::Group {
                id: "sg-101".to_string(),
                description: Some("peers".to_string()),
            }
        );
        let cidr = Target::cidr("10.0.0.0/8");
        assert_eq!(bind_self_target(&cidr, "sg-101"), cidr);
    }
}
