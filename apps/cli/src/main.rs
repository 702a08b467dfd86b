use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use repack::{
    CompositeProgressReporter, ConsoleProgressReporter, IntoProgressCallback, PathCheckMode, Pipeline,
    ProgressCallback, RepackConfig, RepackError, TracingProgressReporter,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "repack")]
#[command(about = "Repackage the latest headless Godot mono release into a deb tree")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON configuration file; omitted fields keep their defaults
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Directory archives are downloaded and extracted into
    #[arg(long, value_name = "DIR", global = true)]
    work_dir: Option<PathBuf>,

    /// Deployment tree root, relative to the work directory
    #[arg(long, value_name = "DIR", global = true)]
    deploy_root: Option<PathBuf>,

    /// Repository owner on the release API
    #[arg(long, global = true)]
    owner: Option<String>,

    /// Repository name on the release API
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Warn about missing extracted paths instead of aborting
    #[arg(long)]
    lenient: bool,

    /// Hide progress bars
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve the latest release and print its download locations
    Resolve,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(repack_error) = e.downcast_ref::<RepackError>() {
                eprintln!();
                eprintln!("{}", repack_error.detailed_report());
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<RepackConfig> {
    let mut config = match &args.config {
        Some(path) => RepackConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => RepackConfig::default(),
    }
    .with_env_overrides();

    if let Some(work_dir) = &args.work_dir {
        config = config.with_work_dir(work_dir);
    }
    if let Some(deploy_root) = &args.deploy_root {
        config = config.with_deploy_root(deploy_root);
    }
    if let Some(owner) = &args.owner {
        config.owner = owner.clone();
    }
    if let Some(repo) = &args.repo {
        config.repo = repo.clone();
    }
    if args.lenient {
        config = config.with_path_checks(PathCheckMode::Lenient);
    }

    Ok(config)
}

fn progress_callback(quiet: bool) -> ProgressCallback {
    if quiet {
        TracingProgressReporter.into_callback()
    } else {
        CompositeProgressReporter::new()
            .add_reporter(ConsoleProgressReporter::new())
            .add_reporter(TracingProgressReporter)
            .into_callback()
    }
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let pipeline = Pipeline::new(config).context("Invalid configuration")?;

    match args.command {
        Some(Commands::Resolve) => {
            let release = pipeline.resolve().await.context("Failed to resolve the latest release")?;
            println!("Release:   {}", release.release_name);
            println!("Version:   {}", release.version);
            println!("Runtime:   {}", release.binary_url);
            println!("Templates: {}", release.templates_url);
            let steps: Vec<&str> = pipeline.layout_plan().steps().iter().map(|s| s.name()).collect();
            println!("Layout:    {}", steps.join(" -> "));
        }
        None => {
            info!(
                "Packaging {}/{} into {}",
                pipeline.config().owner,
                pipeline.config().repo,
                pipeline.config().deploy_root_path().display()
            );
            let report = pipeline
                .run(Some(progress_callback(args.quiet)))
                .await
                .context("Repackaging failed")?;

            for path in &report.layout.missing {
                warn!("Skipped missing path: {}", path.display());
            }
            if report.layout.replaced_templates {
                info!("Replaced previously installed export templates");
            }
            info!(
                "Packaged {} ({} runtime entries, {} template entries)",
                report.release.release_name,
                report.runtime_tree.entries.len(),
                report.templates_tree.entries.len()
            );
        }
    }

    Ok(())
}
