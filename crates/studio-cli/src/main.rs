use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use studio_contracts::briefs::{VideoStrategy, DEFAULT_BRIEF, DEFAULT_QUALITY};
use studio_contracts::config::StudioConfig;
use studio_contracts::error::StudioError;
use studio_engine::{
    CampaignOptions, CampaignReport, CampaignRequest, ReplicateProvider, StudioEngine,
    LANDING_FILE_NAME,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "studio=info";

#[derive(Debug, Parser)]
#[command(name = "studio-rs", version, about = "Creative campaign generator over hosted models")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List studio modes.
    Modes(ConfigArgs),
    /// List legacy creative briefs and quality levels.
    Briefs(ConfigArgs),
    /// Compile a mode into a job schema without running it.
    Schema(SchemaArgs),
    /// Run a studio-mode campaign.
    Campaign(CampaignArgs),
    /// Run a legacy creative brief.
    Brief(BriefArgs),
    /// Re-render a landing page from campaign metadata.
    Landing(LandingArgs),
    /// Check the Replicate token and every registered model.
    Doctor(ConfigArgs),
}

/// `$STUDIO_CONFIG` and `~/.studio/config.json` are read when `--config`
/// is absent.
#[derive(Debug, Args)]
struct ConfigArgs {
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long, default_value = "./creative_outputs")]
    out: PathBuf,
    #[arg(long, env = "STUDIO_PROVIDER", default_value = "replicate")]
    provider: String,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    no_video: bool,
    #[arg(long)]
    landing: bool,
    #[arg(long)]
    enhance: bool,
    #[arg(long)]
    parallel: bool,
}

impl RunArgs {
    fn options(&self) -> CampaignOptions {
        CampaignOptions {
            include_video: !self.no_video,
            landing_page: self.landing,
            enhance_prompts: self.enhance,
            parallel_images: self.parallel,
            events_path: self.events.clone(),
        }
    }

    fn engine(&self) -> Result<StudioEngine> {
        let config = StudioConfig::load(self.config.as_deref())?;
        StudioEngine::new(config, &self.out, &self.provider)
    }
}

#[derive(Debug, Args)]
struct SchemaArgs {
    #[arg(long)]
    mode: String,
    #[arg(long)]
    product: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value = "./creative_outputs")]
    out: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CampaignArgs {
    #[arg(long)]
    mode: String,
    #[arg(long)]
    product: String,
    #[arg(long, default_value = "")]
    description: String,
    #[command(flatten)]
    run: RunArgs,
}

#[derive(Debug, Args)]
struct BriefArgs {
    #[arg(long, default_value = DEFAULT_BRIEF)]
    brief: String,
    #[arg(long, default_value = DEFAULT_QUALITY)]
    quality: String,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long, default_value = "image2video")]
    video: VideoStrategy,
    #[command(flatten)]
    run: RunArgs,
}

#[derive(Debug, Args)]
struct LandingArgs {
    #[arg(long)]
    metadata: PathBuf,
    /// Defaults to index.html next to the metadata file.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("studio-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Modes(args) => run_modes(args),
        Command::Briefs(args) => run_briefs(args),
        Command::Schema(args) => run_schema(args),
        Command::Campaign(args) => run_campaign(args),
        Command::Brief(args) => run_brief(args),
        Command::Landing(args) => run_landing(args),
        Command::Doctor(args) => run_doctor(args),
    }
}

fn run_modes(args: ConfigArgs) -> Result<i32> {
    let config = StudioConfig::load(args.config.as_deref())?;
    for (key, mode) in config.modes.iter() {
        let models = &mode.preferred_models;
        println!("{key}");
        println!("  {} ({})", mode.name, mode.studio_inspiration);
        if !mode.description.is_empty() {
            println!("  {}", mode.description);
        }
        println!(
            "  image: {}  video: {}  audio: {}",
            models.image.as_deref().unwrap_or("-"),
            models.video.as_deref().unwrap_or("-"),
            models.audio.as_deref().unwrap_or("-"),
        );
    }
    Ok(0)
}

fn run_briefs(args: ConfigArgs) -> Result<i32> {
    let config = StudioConfig::load(args.config.as_deref())?;
    for (key, brief) in config.briefs.iter() {
        println!("{key:<22} {}", brief.name);
    }
    println!();
    for (key, level) in config.briefs.quality_levels() {
        println!(
            "{key:<10} steps {:<3} guidance {}",
            level.steps, level.guidance
        );
    }
    Ok(0)
}

fn run_schema(args: SchemaArgs) -> Result<i32> {
    let config = StudioConfig::load(args.config.as_deref())?;
    let engine = StudioEngine::new(config, &args.out, "dryrun")?;
    match engine.export_schema(&args.mode, &args.product, &args.description, &args.out) {
        Ok(path) => {
            println!("Schema written to {}", path.display());
            Ok(0)
        }
        Err(err) => unknown_mode_or(err),
    }
}

fn run_campaign(args: CampaignArgs) -> Result<i32> {
    let engine = args.run.engine()?;
    let request = CampaignRequest::Mode {
        mode: args.mode,
        product: args.product,
        description: args.description,
    };
    match engine.run_campaign(&request, &args.run.options()) {
        Ok(report) => {
            print_report(&report);
            Ok(0)
        }
        Err(err) => unknown_mode_or(err),
    }
}

fn run_brief(args: BriefArgs) -> Result<i32> {
    let engine = args.run.engine()?;
    let request = CampaignRequest::Brief {
        brief: args.brief,
        quality: args.quality,
        image_model: args.image_model,
        video: args.video,
    };
    let report = engine.run_campaign(&request, &args.run.options())?;
    print_report(&report);
    Ok(0)
}

fn run_landing(args: LandingArgs) -> Result<i32> {
    let out = args.out.unwrap_or_else(|| {
        args.metadata
            .parent()
            .map(|dir| dir.join(LANDING_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(LANDING_FILE_NAME))
    });
    StudioEngine::render_landing(&args.metadata, &out)?;
    println!("Landing page written to {}", out.display());
    Ok(0)
}

fn run_doctor(args: ConfigArgs) -> Result<i32> {
    let config = StudioConfig::load(args.config.as_deref())?;
    let provider = ReplicateProvider::new();
    println!("api base: {}", provider.api_base());
    if ReplicateProvider::api_key().is_none() {
        println!("token: missing (set REPLICATE_API_TOKEN)");
        return Ok(1);
    }
    println!("token: set");
    match provider.check_account() {
        Ok(account) => println!(
            "account: ok ({})",
            account
                .get("username")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
        ),
        Err(err) => {
            println!("account: failed: {err:#}");
            return Ok(1);
        }
    }

    let mut failed = 0usize;
    for spec in config.models.list() {
        match provider.check_model(&spec.identifier) {
            Ok(()) => println!("  ok      {:<14} {}", spec.key, spec.identifier),
            Err(err) => {
                failed += 1;
                println!("  failed  {:<14} {err:#}", spec.key);
            }
        }
    }
    if failed > 0 {
        println!("{failed} model(s) unreachable");
        return Ok(1);
    }
    Ok(0)
}

/// Unknown modes print the available names and exit 2; other errors
/// propagate.
fn unknown_mode_or(err: anyhow::Error) -> Result<i32> {
    match err.downcast_ref::<StudioError>() {
        Some(StudioError::UnknownMode { mode, available }) => {
            eprintln!("unknown mode '{mode}'");
            eprintln!("available modes:");
            for name in available {
                eprintln!("  {name}");
            }
            Ok(2)
        }
        _ => Err(err),
    }
}

fn print_report(report: &CampaignReport) {
    println!("Campaign: {}", report.campaign_dir.display());
    println!("{}", report.summary);
    println!("metadata: {}", report.metadata_path.display());
    if let Some(path) = &report.landing_page {
        println!("landing page: {}", path.display());
    }
}
