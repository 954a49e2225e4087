use std::io;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use ruleset_core::RuleSetFilter;
use serde::Serialize;
use sg_migrate::config::{load_config, Config};
use sg_migrate::dry_run::{DryRunProvider, PlannedCall};
use sg_migrate::filter::FilterOptions;
use sg_migrate::resolve::ReferenceMode;
use sg_migrate::retry::RetryingProvider;
use sg_migrate::summary::{render_summary, SyncSummary};
use sg_migrate::sync::{SyncOptions, Syncer};

use crate::backend::{open_environment, save_environment};
use crate::cli::{OutputFormat, SyncArgs};
use crate::confirm::ask_for_confirmation;
use crate::PARTIAL_EXIT;

pub fn run_sync(config_path: &Path, args: SyncArgs) -> Result<ExitCode> {
    let config = load_config(config_path)?;

    if args.update {
        let prompt = format!(
            "update mode replaces the rules of existing rule sets in {}. continue?",
            config.destination.network_id
        );
        if !ask_for_confirmation(&prompt, &mut io::stdin().lock(), &mut io::stderr())? {
            bail!("aborted: update mode was not confirmed");
        }
    }

    let dry_run = args.dry_run || config.dry_run;
    let options = sync_options(&config, &args, dry_run);
    let policy = config.sync.retry_policy();
    let (source, _) = open_environment(&config.source, "Source")?;
    let source = RetryingProvider::new(source, policy);
    let (destination, destination_path) = open_environment(&config.destination, "Destination")?;
    let mut destination = RetryingProvider::new(destination, policy);

    let (summary, planned) = if dry_run {
        let mut planner = DryRunProvider::new(&mut destination);
        let summary = Syncer::new(&source, &mut planner, options)
            .run()
            .context("sync failed")?;
        (summary, Some(planner.into_planned()))
    } else {
        let result = Syncer::new(&source, &mut destination, options).run();
        // a failed run may already have changed the destination
        save_environment(destination.inner().environment(), &destination_path)?;
        (result.context("sync failed")?, None)
    };

    match args.format {
        OutputFormat::Text => {
            println!("{}", render_summary(&summary));
            if let Some(planned) = &planned {
                println!("planned_calls={}", planned.len());
                for call in planned {
                    println!("- {}", call.describe());
                }
            }
        }
        OutputFormat::Json => {
            let report = SyncReport {
                summary: &summary,
                planned: planned.as_deref(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if summary.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!(
            "sync completed with {} skipped references",
            summary.skipped.len()
        );
        Ok(ExitCode::from(PARTIAL_EXIT))
    }
}

fn sync_options(config: &Config, args: &SyncArgs, dry_run: bool) -> SyncOptions {
    let source_filter = if args.source_ids.is_empty() {
        RuleSetFilter::All
    } else {
        RuleSetFilter::Ids(args.source_ids.clone())
    };
    let reference_mode = if args.strict {
        ReferenceMode::Strict
    } else {
        config.sync.reference_mode()
    };
    SyncOptions {
        network_id: config.destination.network_id.clone(),
        source_filter,
        update_existing: args.update,
        filter: FilterOptions {
            preserve_default_group_rules: args.update,
        },
        reference_mode,
        skip_names: config.sync.skip_names.clone(),
        dry_run,
    }
}

#[derive(Debug, Serialize)]
struct SyncReport<'a> {
    summary: &'a SyncSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    planned: Option<&'a [PlannedCall]>,
}
