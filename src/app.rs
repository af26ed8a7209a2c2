use crate::cli::{Cli, Commands, InspectArgs, RunArgs};
use crate::config::{Config, ConfigStore};
use crate::logging;
use crate::notifier::{Notifier, NullNotifier, WebhookNotifier};
use crate::orchestrator::{BatchOrchestrator, CancelFlag};
use crate::policy;
use crate::probe::AudioProbe;
use crate::transcoder::FfmpegEngine;
use anyhow::{Context, Result};
use clap::Parser;

pub fn run() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run_batch(args),
        Commands::Inspect(args) => run_inspect(args),
        Commands::Formats => run_formats(),
    }
}

fn load_config(args: &RunArgs) -> Result<Config> {
    let store = ConfigStore::new()?;
    let mut config = store
        .load()
        .with_context(|| format!("load config {}", store.path().display()))?;
    if !args.roots.is_empty() {
        config.roots = args.roots.clone();
    }
    if let Some(bitrate) = args.bitrate {
        config.target.bitrate_kbps = bitrate;
    }
    if let Some(webhook) = &args.webhook {
        config.webhook_url = Some(webhook.clone());
    }
    if let Some(jobs) = args.jobs {
        config.jobs = Some(jobs);
    }
    Ok(config)
}

fn run_batch(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;
    tracing::info!(
        roots = ?config.roots,
        codec = %config.target.codec,
        bitrate = config.target.bitrate_kbps,
        "starting audiopress"
    );

    let notifier: Box<dyn Notifier> = match &config.webhook_url {
        Some(url) => Box::new(WebhookNotifier::new(url.clone())?),
        None => Box::new(NullNotifier),
    };
    let orchestrator = BatchOrchestrator::new(config, Box::new(FfmpegEngine::default()), notifier);

    let summary = orchestrator.run(&CancelFlag::default())?;
    println!("{}", summary.headline());
    for failure in &summary.failures {
        println!("  {}: {}", failure.path.display(), failure.reason);
    }
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let store = ConfigStore::new()?;
    let config = store.load()?;
    let record = AudioProbe
        .probe(&args.input)
        .with_context(|| format!("probe {}", args.input.display()))?;
    let decision = policy::decide(&record, &config.target);

    println!("path:     {}", record.path.display());
    println!("codec:    {}", record.codec);
    match record.bitrate_kbps {
        Some(kbps) => println!("bitrate:  {kbps} kbps"),
        None => println!("bitrate:  unknown"),
    }
    println!("size:     {} bytes", record.size_bytes);
    println!("title:    {}", record.tags.title.as_deref().unwrap_or("-"));
    println!("artist:   {}", record.tags.artist.as_deref().unwrap_or("-"));
    println!("album:    {}", record.tags.album.as_deref().unwrap_or("-"));
    match record.tags.track {
        Some(track) => println!("track:    {track}"),
        None => println!("track:    -"),
    }
    println!("genre:    {}", record.tags.genre.as_deref().unwrap_or("-"));
    println!("decision: {decision:?}");
    Ok(())
}

fn run_formats() -> Result<()> {
    let store = ConfigStore::new()?;
    let config = store.load()?;
    println!("recognized extensions:");
    for extension in &config.extensions {
        println!("  .{extension}");
    }
    println!(
        "target: {} at {} kbps",
        config.target.codec, config.target.bitrate_kbps
    );
    Ok(())
}
