mod batch;
mod cli;
mod config;
mod data;
mod error;
mod pipeline;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use cli::{AnalyzeArg, CleanArg, Cli, Command, ServeArg};
use config::AppConfig;
use data::loader::TableFormat;
use pipeline::Analyzer;
use server::AppState;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env = env_logger::Env::default().default_filter_or("info");
    let mut logger = env_logger::Builder::from_env(env);
    if let Some(filter) = &cli.log_level {
        logger.parse_filters(filter);
    }
    logger.init();

    let config = AppConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Serve(arg) => serve(&config, &arg),
        Command::Clean(arg) => clean(&config, &arg),
        Command::Analyze(arg) => analyze(&config, &arg),
    }
}

fn serve(config: &AppConfig, arg: &ServeArg) -> Result<()> {
    let bind = arg.bind.unwrap_or(config.server.bind);
    let state = AppState {
        analyzer: Analyzer::new(config.columns.clone(), config.model),
        default_limit: config.server.default_limit,
    };

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building runtime")?
        .block_on(server::serve(bind, state))
}

fn clean(config: &AppConfig, arg: &CleanArg) -> Result<()> {
    let input = arg.input.as_ref().unwrap_or(&config.batch.input);
    let output_dir = arg.output_dir.as_ref().unwrap_or(&config.batch.output_dir);

    let summary = batch::run(config, input, output_dir)?;

    println!("Cleaning complete: {}", summary.outputs.cleaned.display());
    println!(
        "Rows: {} in, {} incomplete, {} out",
        summary.cleaning.rows_in, summary.cleaning.dropped_incomplete, summary.cleaning.rows_out
    );
    for pass in &summary.cleaning.passes {
        println!("  {} outliers removed: {}", pass.field, pass.removed);
    }
    println!("Stations: {}", summary.stations);
    match summary.correlation {
        Some(r) => println!("Salinity-depth correlation: {r:.2}"),
        None => println!("Salinity-depth correlation: n/a"),
    }
    println!(
        "TALK estimated for {} rows: {}",
        summary.estimated,
        summary.outputs.with_talk.display()
    );
    Ok(())
}

fn analyze(config: &AppConfig, arg: &AnalyzeArg) -> Result<()> {
    let payload =
        std::fs::read(&arg.file).with_context(|| format!("reading {}", arg.file.display()))?;
    let format = TableFormat::detect(arg.file.to_str(), &payload);
    let limit = arg
        .limit
        .map_or(config.server.default_limit, |l| usize::try_from(l).unwrap_or(usize::MAX));

    info!("analyzing {} as {format:?}", arg.file.display());
    let analyzer = Analyzer::new(config.columns.clone(), config.model);
    let rows = analyzer.analyze(&payload, format, limit)?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
