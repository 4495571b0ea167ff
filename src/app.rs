use crate::{
    cli::args::Cli,
    config::{ConfigLoader, GlobalConfig},
    core::{errors::HostenumError, scheduler::Orchestrator, state::ResultCollection},
    executors::toolchain,
    reporters::{validate, writer},
    targets::{safety, subtract, NameResolver, TargetSet, TargetSetBuilder},
    ui::{printer, progress},
    utils::logging,
};
use anyhow::{Context, Result};
use chrono::Utc;
use std::io::{BufRead, BufReader, IsTerminal, Write};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Applies command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut GlobalConfig, cli: &Cli) {
    if let Some(jobs) = cli.jobs {
        config.concurrency.max_hosts = usize::from(jobs);
    }
    if let Some(secs) = cli.timeout {
        config.scan.host_timeout_secs = secs;
    }
    if cli.json {
        config.report.json_summary = true;
    }
}

/// Asks before any hostname is resolved. Exclusions count too, since
/// resolving them also queries DNS.
async fn confirm_symbolic<R, W>(targets: &str, exclude: &str, input: R, output: W) -> Result<bool>
where
    R: BufRead,
    W: Write,
{
    let gated: Vec<&str> = [targets, exclude]
        .into_iter()
        .filter(|spec| safety::requires_confirmation(spec))
        .collect();

    if gated.is_empty() {
        return Ok(true);
    }

    let resolver = safety::current_resolver().await;
    safety::confirm(&gated.join(","), &resolver, input, output).context("Failed to read confirmation")
}

/// Builds the final enumeration set: targets minus exclusions. An empty
/// result is a run-level failure.
pub fn prepare_targets<R: NameResolver>(
    targets: &str,
    exclude: &str,
    builder: &TargetSetBuilder<R>,
) -> Result<TargetSet, HostenumError> {
    let requested = builder.build_set(targets);
    if requested.is_empty() {
        return Err(HostenumError::NoTargets);
    }

    let excluded = builder.build_set(exclude);
    let remaining = subtract(&requested, &excluded);
    tracing::info!(
        "{} target(s) requested, {} excluded, {} remaining",
        requested.len(),
        requested.len() - remaining.len(),
        remaining.len()
    );

    if remaining.is_empty() {
        return Err(HostenumError::AllExcluded(requested.len()));
    }
    Ok(remaining)
}

pub async fn run(cli: Cli) -> Result<()> {
    let level = logging::level_from_cli(&cli);
    logging::init(level)?;

    run_with(cli, BufReader::new(std::io::stdin()), std::io::stderr()).await
}

/// The run itself, with the confirmation prompt on the given streams.
async fn run_with<R, W>(cli: Cli, input: R, prompt: W) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    if let Some(path) = &cli.write_config {
        ConfigLoader::generate_template(path)?;
        println!("Default configuration written to {}", path.display());
        return Ok(());
    }

    let mut config = ConfigLoader::load_with_custom_path(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    ConfigLoader::validate_config(&config)?;

    let target_spec = cli.targets.clone().unwrap_or_default();
    let exclude_spec = cli.exclude.clone().unwrap_or_default();

    if !confirm_symbolic(&target_spec, &exclude_spec, input, prompt).await? {
        println!("Enumeration aborted by user.");
        return Ok(());
    }

    let max_range_hosts = config.targets.max_range_hosts;
    let targets = tokio::task::spawn_blocking(move || {
        let builder = TargetSetBuilder::system().with_max_range_hosts(max_range_hosts);
        prepare_targets(&target_spec, &exclude_spec, &builder)
    })
    .await
    .context("Target resolution task failed")??;

    let status = toolchain::check(&config);
    printer::print_toolchain_warnings(&status);

    let results = ResultCollection::new();
    let (sender, receiver) = mpsc::unbounded_channel();
    let show_progress = !cli.verbose && !cli.debug && std::io::stderr().is_terminal();
    let progress = progress::spawn(targets.len(), show_progress, receiver);

    let orchestrator = Arc::new(Orchestrator::from_config(&config).with_events(sender));
    let results = orchestrator.execute_all(&targets, results).await;
    if let Err(e) = progress.await {
        tracing::debug!("Progress display ended abnormally: {}", e);
    }

    let path = cli
        .output
        .clone()
        .unwrap_or_else(|| writer::default_report_path(Utc::now()));
    let written = writer::write_all(&results, &path, config.report.json_summary)
        .map_err(|e| HostenumError::Report(format!("{:#}", e)))?;
    validate::validate_report(&path, results.len())
        .map_err(|e| HostenumError::Report(format!("{:#}", e)))?;

    printer::print_summary(&results, &written);
    Ok(())
}
