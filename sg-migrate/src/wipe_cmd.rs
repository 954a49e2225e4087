use std::io;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use sg_migrate::config::load_config;
use sg_migrate::dry_run::DryRunProvider;
use sg_migrate::retry::RetryingProvider;
use sg_migrate::wipe::{wipe_rule_sets, WipeReport};

use crate::backend::{open_environment, save_environment};
use crate::cli::{OutputFormat, WipeArgs};
use crate::confirm::ask_for_confirmation;
use crate::PARTIAL_EXIT;

pub fn run_wipe(config_path: &Path, args: WipeArgs) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let network = (!args.all_networks).then_some(config.destination.network_id.as_str());
    let scope = network.map_or_else(|| "all networks".to_string(), |n| format!("network {n}"));

    let mut input = io::stdin().lock();
    let mut output = io::stderr();
    let first = format!("this revokes every rule of every rule set in {scope}. continue?");
    if !ask_for_confirmation(&first, &mut input, &mut output)? {
        bail!("aborted: wipe was not confirmed");
    }
    let second = format!(
        "really wipe destination account {} in {}?",
        config.destination.access_key, config.destination.region
    );
    if !ask_for_confirmation(&second, &mut input, &mut output)? {
        bail!("aborted: wipe was not confirmed");
    }

    let (destination, path) = open_environment(&config.destination, "Destination")?;
    let mut destination = RetryingProvider::new(destination, config.sync.retry_policy());

    let report = if config.dry_run {
        let mut planner = DryRunProvider::new(&mut destination);
        let report = wipe_rule_sets(&mut planner, network).context("wipe failed")?;
        for call in planner.planned() {
            println!("- planned {}", call.describe());
        }
        report
    } else {
        let report = wipe_rule_sets(&mut destination, network).context("wipe failed")?;
        save_environment(destination.inner().environment(), &path)?;
        report
    };

    match args.format {
        OutputFormat::Text => println!("{}", render_wipe(&report, config.dry_run)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.failures.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("wipe left {} rule directions in place", report.failures.len());
        Ok(ExitCode::from(PARTIAL_EXIT))
    }
}

fn render_wipe(report: &WipeReport, dry_run: bool) -> String {
    let mut out = vec![format!(
        "wipe_summary dry_run={dry_run} rule_sets={} revoked_rules={} failures={}",
        report.revoked.len(),
        report.revoked_rules(),
        report.failures.len()
    )
    .cyan()
    .to_string()];
    for wiped in &report.revoked {
        out.push(format!("- {} {} rules={}", wiped.name, wiped.id, wiped.rules));
    }
    for failure in &report.failures {
        out.push(
            format!(
                "- [error] {} {} {}: {}",
                failure.name, failure.id, failure.direction, failure.error
            )
            .red()
            .to_string(),
        );
    }
    out.join("\n")
}
