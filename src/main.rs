use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use nuget_manager::cancel::CancelToken;
use nuget_manager::config::{LOG_ENV_VAR, ManagerConfig, config_path, log_path};
use nuget_manager::manager::PackageManager;
use nuget_manager::mutation::{
    DeprecationNote, DeprecationReason, MutationOutcome, MutationRequest,
};
use nuget_manager::version::ordering::VersionOrdering;
use nuget_manager::version::types::{PackageId, SourceSelector};

#[derive(Parser)]
#[command(name = "nuget-manager")]
#[command(version, about = "Inspect NuGet package versions and bulk unlist or deprecate them")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every version of a package with its listed state
    Versions {
        package: String,
        /// flat, registration, cli, web or all
        #[arg(long)]
        source: Option<String>,
        /// Cross-check listed state against the registration API and CLI
        #[arg(long)]
        calibrate: bool,
        /// Sort by semantic version precedence instead of ordinal text
        #[arg(long)]
        semantic: bool,
    },
    /// Unlist versions of a package
    Unlist {
        package: String,
        #[arg(long, env = "NUGET_API_KEY", hide_env_values = true)]
        api_key: String,
        #[arg(required = true)]
        versions: Vec<String>,
    },
    /// Deprecate versions of a package (applied as an unlist)
    Deprecate {
        package: String,
        #[arg(long, env = "NUGET_API_KEY", hide_env_values = true)]
        api_key: String,
        #[arg(long = "reason", value_enum)]
        reasons: Vec<ReasonArg>,
        /// Free-form reason
        #[arg(long)]
        other: Option<String>,
        /// Package to use instead
        #[arg(long)]
        alternative: Option<String>,
        #[arg(long, requires = "alternative")]
        alternative_version: Option<String>,
        #[arg(required = true)]
        versions: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReasonArg {
    CriticalBugs,
    Legacy,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose)?;

    let path = cli.config.clone().unwrap_or_else(config_path);
    let config = ManagerConfig::load(&path)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli.command, config))
}

fn init_logging(verbose: bool) -> anyhow::Result<WorkerGuard> {
    let path = log_path();
    let dir = path.parent().context("log path has no parent directory")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {:?}", dir))?;

    let file_name = path.file_name().context("log path has no file name")?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}

async fn run(command: Command, mut config: ManagerConfig) -> anyhow::Result<()> {
    match command {
        Command::Versions {
            package,
            source,
            calibrate,
            semantic,
        } => {
            if semantic {
                config.resolution.ordering = VersionOrdering::Semantic;
            }
            let manager = PackageManager::connect(&config).await?;
            let package = PackageId::new(&package)?;
            let selector = source
                .as_deref()
                .map(SourceSelector::from_name)
                .unwrap_or(manager.default_selector());

            let resolution = manager
                .resolve_with(&package, selector, calibrate || config.resolution.calibrate)
                .await?;

            for line in resolution.log_lines() {
                eprintln!("{line}");
            }
            for record in resolution.result.records() {
                let status = if record.listed { "listed" } else { "unlisted" };
                println!("{:<32} {}", record.version, status);
            }
            Ok(())
        }
        Command::Unlist {
            package,
            api_key,
            versions,
        } => {
            let manager = PackageManager::connect(&config).await?;
            let package = PackageId::new(&package)?;
            let Some(targets) = plan_targets(&manager, &package, &versions).await? else {
                return Ok(());
            };

            let request = MutationRequest::delist(package, &api_key, targets);
            let outcome = run_with_interrupt(&manager, &request).await;
            report(&outcome)
        }
        Command::Deprecate {
            package,
            api_key,
            reasons,
            other,
            alternative,
            alternative_version,
            versions,
        } => {
            let mut reasons: Vec<DeprecationReason> = reasons
                .into_iter()
                .map(|r| match r {
                    ReasonArg::CriticalBugs => DeprecationReason::CriticalBugs,
                    ReasonArg::Legacy => DeprecationReason::Legacy,
                })
                .collect();
            if let Some(other) = other.filter(|o| !o.trim().is_empty()) {
                reasons.push(DeprecationReason::Other(other));
            }
            if reasons.is_empty() {
                bail!("At least one --reason or --other is required");
            }

            let mut note = DeprecationNote::new(reasons);
            if let Some(alternative) = &alternative {
                note = note.with_alternative(alternative, alternative_version.as_deref());
            }

            let manager = PackageManager::connect(&config).await?;
            let package = PackageId::new(&package)?;
            let Some(targets) = plan_targets(&manager, &package, &versions).await? else {
                return Ok(());
            };

            let request = MutationRequest::deprecate(package, &api_key, targets, note);
            let outcome = run_with_interrupt(&manager, &request).await;
            report(&outcome)
        }
    }
}

/// Drops versions that are already unlisted or unknown; `None` when nothing
/// is left to do
async fn plan_targets(
    manager: &PackageManager,
    package: &PackageId,
    versions: &[String],
) -> anyhow::Result<Option<Vec<String>>> {
    let plan = manager.plan_unlist(package, versions).await?;

    for version in &plan.already_unlisted {
        eprintln!("Skipping {version}: already unlisted");
    }
    for version in &plan.unknown {
        eprintln!("Skipping {version}: not published");
    }
    if plan.is_empty() {
        eprintln!("Nothing to do");
        return Ok(None);
    }
    Ok(Some(plan.targets))
}

async fn run_with_interrupt(manager: &PackageManager, request: &MutationRequest) -> MutationOutcome {
    let batch = manager.run_batch(
        request,
        |done, total| eprintln!("[{done}/{total}]"),
        CancelToken::new(),
    );
    tokio::pin!(batch);

    tokio::select! {
        outcome = &mut batch => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, cancelling batch");
            eprintln!("Cancelling after the current version...");
            manager.request_cancel();
            batch.await
        }
    }
}

fn report(outcome: &MutationOutcome) -> anyhow::Result<()> {
    for item in &outcome.items {
        let mark = if item.succeeded { "✓" } else { "×" };
        println!("{mark} {}: {}", item.version, item.message);
    }
    println!("{}", outcome.summary());

    if !outcome.all_succeeded() {
        bail!("{}", outcome.summary());
    }
    Ok(())
}
