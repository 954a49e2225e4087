use pretty_assertions::assert_eq;
use ruleset_core::{
    AccessControlProvider, AddressFamily, Direction, Environment, ListEntry, MemoryProvider,
    NamedAddressList, NewAddressList, NewRuleSet, ProviderError, Rule, RuleSet, RuleSetFilter,
    Target,
};
use sg_migrate::dry_run::{DryRunProvider, PlannedCall};
use sg_migrate::filter::FilterOptions;
use sg_migrate::resolve::ReferenceMode;
use sg_migrate::summary::SkipReason;
use sg_migrate::sync::{SyncError, SyncOptions, Syncer};

/// `app` (sg-1) admits itself; `db` (sg-2) admits `app`.
fn app_and_db() -> (RuleSet, RuleSet) {
    let mut app = RuleSet::new("sg-1", "app", "vpc-src");
    app.inbound.push(Rule::tcp(443, vec![Target::group("sg-1")]));
    let mut db = RuleSet::new("sg-2", "db", "vpc-src");
    db.inbound.push(Rule::tcp(5432, vec![Target::group("sg-1")]));
    (app, db)
}

fn source_with(rule_sets: Vec<RuleSet>) -> MemoryProvider {
    let env = rule_sets
        .into_iter()
        .fold(Environment::new(1), Environment::with_rule_set);
    MemoryProvider::new(env)
}

/// Destination network `vpc-dst`; its default takes sg-100, new ids start at 101.
fn destination() -> MemoryProvider {
    MemoryProvider::new(Environment::new(100).with_network("vpc-dst"))
}

fn options() -> SyncOptions {
    SyncOptions::new("vpc-dst")
}

#[test]
fn copies_rule_sets_and_rewires_cross_references() {
    let (app, db) = app_and_db();
    let source = source_with(vec![app, db]);
    let mut destination = destination();

    let summary = Syncer::new(&source, &mut destination, options())
        .run()
        .expect("sync should succeed");

    assert!(summary.is_complete());
    assert_eq!(summary.created_count(), 2);
    assert_eq!(summary.cross_reference_batches, 1);

    let env = destination.environment();
    let app = env.rule_set_named("vpc-dst", "app").expect("app created");
    let db = env.rule_set_named("vpc-dst", "db").expect("db created");
    assert_eq!(app.id, "sg-101");
    assert_eq!(db.id, "sg-102");
    assert_eq!(
        app.inbound,
        vec![Rule::tcp(443, vec![Target::group("sg-101")])]
    );
    assert_eq!(
        db.inbound,
        vec![Rule::tcp(5432, vec![Target::group("sg-101")])]
    );
}

#[test]
fn created_rule_sets_carry_creation_tag() {
    let (app, _) = app_and_db();
    let source = source_with(vec![app]);
    let mut destination = destination();
    Syncer::new(&source, &mut destination, options())
        .run()
        .expect("sync");

    let app = destination.environment().rule_set("sg-101").expect("app");
    assert!(app.tags.contains_key(sg_migrate::tags::CREATED_AT_TAG));
}

#[test]
fn rule_with_dangling_target_is_dropped_whole() {
    let (app, mut db) = app_and_db();
    db.inbound[0].targets = vec![Target::cidr("10.9.0.0/16"), Target::group("sg-999")];
    db.inbound.push(Rule::tcp(6432, vec![Target::group("sg-1")]));
    let source = source_with(vec![app, db]);
    let mut destination = destination();

    let summary = Syncer::new(&source, &mut destination, options())
        .run()
        .expect("lenient run completes");

    assert!(!summary.is_complete());
    assert_eq!(summary.skipped.len(), 1);
    let skip = &summary.skipped[0];
    assert_eq!(skip.rule_set, "db");
    assert_eq!(skip.reference, "sg-999");
    assert_eq!(skip.reason, SkipReason::ReferenceNotCopied);

    let db = destination.environment().rule_set("sg-102").expect("db");
    assert_eq!(
        db.inbound,
        vec![Rule::tcp(6432, vec![Target::group("sg-101")])]
    );
}

#[test]
fn outbound_cross_group_rule_is_rewired() {
    let mut app = RuleSet::new("sg-1", "app", "vpc-src");
    app.outbound.push(Rule::tcp(5432, vec![Target::group("sg-2")]));
    let db = RuleSet::new("sg-2", "db", "vpc-src");
    let source = source_with(vec![app, db]);
    let mut destination = destination();

    let summary = Syncer::new(&source, &mut destination, options())
        .run()
        .expect("sync");

    assert!(summary.is_complete());
    assert_eq!(summary.cross_reference_batches, 1);
    let app = destination.environment().rule_set("sg-101").expect("app");
    assert!(app.inbound.is_empty());
    assert_eq!(
        app.outbound,
        vec![Rule::tcp(5432, vec![Target::group("sg-102")])]
    );
}

/// Destination that accepts everything except new rules.
struct RejectingAppends(MemoryProvider);

impl AccessControlProvider for RejectingAppends {
    fn list_rule_sets(&self, filter: &RuleSetFilter) -> Result<Vec<RuleSet>, ProviderError> {
        self.0.list_rule_sets(filter)
    }

    fn create_rule_set(&mut self, request: &NewRuleSet) -> Result<String, ProviderError> {
        self.0.create_rule_set(request)
    }

    fn append_rules(
        &mut self,
        _rule_set_id: &str,
        _direction: Direction,
        _rules: &[Rule],
    ) -> Result<(), ProviderError> {
        Err(ProviderError::Rejected("rule quota exceeded".to_string()))
    }

    fn revoke_rules(
        &mut self,
        rule_set_id: &str,
        direction: Direction,
        rules: &[Rule],
    ) -> Result<(), ProviderError> {
        self.0.revoke_rules(rule_set_id, direction, rules)
    }

    fn list_named_address_lists(
        &self,
        ids: &[String],
    ) -> Result<Vec<NamedAddressList>, ProviderError> {
        self.0.list_named_address_lists(ids)
    }

    fn create_named_address_list(
        &mut self,
        request: &NewAddressList,
    ) -> Result<String, ProviderError> {
        self.0.create_named_address_list(request)
    }
}

#[test]
fn rejected_rules_on_new_rule_set_are_fatal() {
    let mut web = RuleSet::new("sg-1", "web", "vpc-src");
    web.inbound.push(Rule::tcp(80, vec![Target::cidr("10.0.0.0/8")]));
    let source = source_with(vec![web]);
    let mut destination = RejectingAppends(destination());

    let err = Syncer::new(&source, &mut destination, options())
        .run()
        .expect_err("authorization failure on a fresh rule set");

    match err {
        SyncError::AuthorizeFailed {
            name,
            id,
            direction,
            source,
        } => {
            assert_eq!(name, "web");
            assert_eq!(id, "sg-101");
            assert_eq!(direction, Direction::Inbound);
            assert!(matches!(source, ProviderError::Rejected(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn rejected_rules_on_reused_default_are_recorded() {
    let ssh = Rule::tcp(22, vec![Target::cidr("10.1.0.0/16")]);
    let mut default = RuleSet::new("sg-9", "default", "vpc-src");
    default.inbound.push(ssh.clone());
    let mut web = RuleSet::new("sg-1", "web", "vpc-src");
    web.inbound.push(Rule::tcp(80, vec![Target::cidr("10.0.0.0/8")]));
    let source = source_with(vec![default, web]);

    let mut env = Environment::new(100).with_network("vpc-dst");
    env.rule_sets
        .iter_mut()
        .find(|rs| rs.id == "sg-100")
        .expect("seeded default")
        .inbound
        .push(ssh);
    let mut destination = MemoryProvider::new(env);

    let summary = Syncer::new(&source, &mut destination, options())
        .run()
        .expect("run continues past a reused rule set");

    assert_eq!(summary.skipped.len(), 1);
    let skip = &summary.skipped[0];
    assert_eq!(skip.rule_set, "default");
    assert_eq!(skip.reference, "sg-100");
    assert_eq!(skip.reason, SkipReason::AuthorizeFailed);
    assert_eq!(summary.reused_count(), 1);
    assert_eq!(summary.created_count(), 1);
    let web = destination.environment().rule_set("sg-101").expect("web");
    assert_eq!(web.inbound.len(), 1);
}

#[test]
fn strict_mode_aborts_on_dangling_reference() {
    let (app, mut db) = app_and_db();
    db.inbound[0].targets = vec![Target::group("sg-999")];
    let source = source_with(vec![app, db]);
    let mut destination = destination();

    let options = SyncOptions {
        reference_mode: ReferenceMode::Strict,
        ..options()
    };
    let err = Syncer::new(&source, &mut destination, options)
        .run()
        .expect_err("strict run fails");

    match err {
        SyncError::Dangling(dangling) => assert_eq!(dangling.0.reference, "sg-999"),
        other => panic!("unexpected error: {other}"),
    }
    let db = destination.environment().rule_set("sg-102").expect("db");
    assert!(db.inbound.is_empty());
}

#[test]
fn referenced_prefix_list_is_cloned_verbatim() {
    let corp = NamedAddressList {
        id: "pl-7".to_string(),
        name: "corp".to_string(),
        family: AddressFamily::IPv4,
        max_entries: 5,
        entries: vec![
            ListEntry::new("10.0.0.0/8", "offices"),
            ListEntry::new("172.16.0.0/12", "vpn"),
        ],
        tags: Default::default(),
    };
    let mut app = RuleSet::new("sg-1", "app", "vpc-src");
    app.inbound.push(Rule::tcp(22, vec![Target::prefix_list("pl-7")]));
    let source = MemoryProvider::new(
        Environment::new(1)
            .with_rule_set(app)
            .with_address_list(corp.clone()),
    );
    let mut destination = destination();

    let summary = Syncer::new(&source, &mut destination, options())
        .run()
        .expect("sync");

    assert!(summary.is_complete());
    assert_eq!(summary.address_lists.len(), 1);
    let env = destination.environment();
    let copy = env.address_list("pl-101").expect("list cloned first");
    assert_eq!(copy.name, "corp");
    assert_eq!(copy.entries, corp.entries);
    assert_eq!(copy.max_entries, 5);

    let app = env.rule_set_named("vpc-dst", "app").expect("app");
    assert_eq!(app.id, "sg-102");
    assert_eq!(
        app.inbound,
        vec![Rule::tcp(22, vec![Target::prefix_list("pl-101")])]
    );
}

#[test]
fn default_rule_sets_and_wide_open_egress_are_filtered() {
    let mut orphan = RuleSet::new("sg-8", "default", "");
    orphan.inbound.push(Rule::tcp(22, vec![Target::cidr("10.0.0.0/8")]));

    let mut default = RuleSet::new("sg-9", "default", "vpc-src");
    default.inbound.push(Rule::all_traffic(vec![Target::group("sg-9")]));
    default.inbound.push(Rule::tcp(22, vec![Target::cidr("10.1.0.0/16")]));
    default
        .outbound
        .push(Rule::all_traffic(vec![Target::cidr("0.0.0.0/0")]));

    let mut web = RuleSet::new("sg-1", "web", "vpc-src");
    web.inbound.push(Rule::tcp(80, vec![Target::cidr("0.0.0.0/0")]));
    web.outbound.push(Rule::all_traffic(vec![Target::cidr("0.0.0.0/0")]));
    web.outbound.push(Rule::tcp(443, vec![Target::cidr("0.0.0.0/0")]));

    let source = source_with(vec![orphan, default, web]);
    let mut destination = destination();
    let summary = Syncer::new(&source, &mut destination, options())
        .run()
        .expect("sync");

    assert_eq!(summary.filter.dropped_rule_sets, 1);
    assert_eq!(summary.filter.dropped_wide_open, 2);
    assert_eq!(summary.filter.discarded_default_refs, 1);
    assert_eq!(summary.reused_count(), 1);
    assert_eq!(summary.created_count(), 1);

    let env = destination.environment();
    let default = env.rule_set("sg-100").expect("destination default");
    assert!(default
        .inbound
        .contains(&Rule::tcp(22, vec![Target::cidr("10.1.0.0/16")])));

    let web = env.rule_set_named("vpc-dst", "web").expect("web");
    assert_eq!(
        web.outbound,
        vec![Rule::tcp(443, vec![Target::cidr("0.0.0.0/0")])]
    );
}

#[test]
fn existing_name_is_fatal_without_update_mode() {
    let (app, _) = app_and_db();
    let source = source_with(vec![app]);
    let mut existing = RuleSet::new("sg-50", "app", "vpc-dst");
    existing
        .inbound
        .push(Rule::tcp(8080, vec![Target::cidr("10.0.0.0/8")]));
    let mut destination = MemoryProvider::new(
        Environment::new(100)
            .with_network("vpc-dst")
            .with_rule_set(existing),
    );

    let err = Syncer::new(&source, &mut destination, options())
        .run()
        .expect_err("duplicate name");
    assert!(matches!(err, SyncError::DuplicateRuleSet(name) if name == "app"));
}

#[test]
fn update_mode_replaces_rules_of_existing_rule_set() {
    let (app, _) = app_and_db();
    let source = source_with(vec![app]);
    let mut existing = RuleSet::new("sg-50", "app", "vpc-dst");
    existing
        .inbound
        .push(Rule::tcp(8080, vec![Target::cidr("10.0.0.0/8")]));
    let mut destination = MemoryProvider::new(
        Environment::new(100)
            .with_network("vpc-dst")
            .with_rule_set(existing),
    );

    let options = SyncOptions {
        update_existing: true,
        filter: FilterOptions {
            preserve_default_group_rules: true,
        },
        ..options()
    };
    let summary = Syncer::new(&source, &mut destination, options)
        .run()
        .expect("update run");

    assert_eq!(summary.reused_count(), 1);
    let app = destination.environment().rule_set("sg-50").expect("app");
    assert_eq!(
        app.inbound,
        vec![Rule::tcp(443, vec![Target::group("sg-50")])]
    );
}

#[test]
fn excluded_names_are_not_created_and_references_to_them_skipped() {
    let (app, db) = app_and_db();
    let source = source_with(vec![app, db]);
    let mut destination = destination();

    let options = SyncOptions {
        skip_names: vec!["app".to_string()],
        ..options()
    };
    let summary = Syncer::new(&source, &mut destination, options)
        .run()
        .expect("sync");

    assert_eq!(summary.excluded, vec!["app"]);
    assert_eq!(summary.cross_reference_batches, 0);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].reason, SkipReason::ReferenceNotCreated);

    let env = destination.environment();
    assert!(env.rule_set_named("vpc-dst", "app").is_none());
    let db = env.rule_set_named("vpc-dst", "db").expect("db");
    assert!(db.inbound.is_empty());
}

#[test]
fn selected_ids_leave_references_outside_the_selection_dangling() {
    let (app, db) = app_and_db();
    let source = source_with(vec![app, db]);
    let mut destination = destination();

    let options = SyncOptions {
        source_filter: RuleSetFilter::Ids(vec!["sg-2".to_string()]),
        ..options()
    };
    let summary = Syncer::new(&source, &mut destination, options)
        .run()
        .expect("sync");

    assert_eq!(summary.rule_sets.len(), 1);
    assert_eq!(summary.skipped[0].reference, "sg-1");
    assert_eq!(summary.skipped[0].reason, SkipReason::ReferenceNotCopied);
}

#[test]
fn malformed_source_filter_is_fatal() {
    let (app, _) = app_and_db();
    let source = source_with(vec![app]);
    let mut destination = destination();

    let options = SyncOptions {
        source_filter: RuleSetFilter::Ids(vec!["web".to_string()]),
        ..options()
    };
    let err = Syncer::new(&source, &mut destination, options)
        .run()
        .expect_err("malformed");
    assert!(matches!(err, SyncError::MalformedFilter(_)));
}

#[test]
fn dry_run_plans_every_call_and_leaves_destination_untouched() {
    let (app, db) = app_and_db();
    let source = source_with(vec![app, db]);
    let mut destination = destination();
    let before = destination.environment().clone();

    let mut planner = DryRunProvider::new(&mut destination);
    let options = SyncOptions {
        dry_run: true,
        ..options()
    };
    let summary = Syncer::new(&source, &mut planner, options)
        .run()
        .expect("dry run");
    let planned = planner.into_planned();

    assert!(summary.dry_run);
    assert_eq!(summary.rule_sets[0].destination_id, "dryrun-sg-1");
    assert_eq!(planned.len(), 4);
    assert_eq!(
        planned[3],
        PlannedCall::AppendRules {
            rule_set_id: "dryrun-sg-2".to_string(),
            direction: Direction::Inbound,
            rules: 1,
        }
    );
    assert_eq!(destination.environment(), &before);
}

#[test]
fn dry_run_rejects_unknown_destination_network() {
    let (app, _) = app_and_db();
    let source = source_with(vec![app]);
    let mut destination = destination();

    let mut planner = DryRunProvider::new(&mut destination);
    let options = SyncOptions {
        dry_run: true,
        ..SyncOptions::new("vpc-nope")
    };
    let err = Syncer::new(&source, &mut planner, options)
        .run()
        .expect_err("dry run sees the missing network");

    assert!(matches!(err, SyncError::NetworkNotFound(n) if n == "vpc-nope"));
    assert!(planner.planned().is_empty());
}
