use crate::infra::{build_pipeline, load_config};
use crate::server;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use survey_bridge::error::AppError;
use survey_bridge::workflows::skills_match::{build_request, translate, RawResponse};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "Survey Bridge",
    about = "Translate survey responses into skills-matcher submissions and email the results",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Process one batch of new survey responses and print the summary
    Run,
    /// Build the translation map and print it
    Map(MapArgs),
    /// Translate a single raw response file against the cached map
    Translate(TranslateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
struct MapArgs {
    /// Fetch fresh schemas from both services instead of trusting the caches
    #[arg(long)]
    refresh: bool,
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Path to a raw survey response (JSON object)
    #[arg(long)]
    response: PathBuf,
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args),
        Command::Run => run_batch(),
        Command::Map(args) => print_map(args),
        Command::Translate(args) => translate_file(args),
    }
}

fn run_batch() -> Result<(), AppError> {
    let config = load_config()?;
    let pipeline = build_pipeline(&config)?;
    let summary = pipeline.run_batch()?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn print_map(args: MapArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let pipeline = build_pipeline(&config)?;
    let map = pipeline.translation_map(args.refresh)?;
    info!(
        questions = map.len(),
        skills = map.skills_matcher().len(),
        "translation map built"
    );
    println!("{}", serde_json::to_string_pretty(&map)?);
    Ok(())
}

fn translate_file(args: TranslateArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let pipeline = build_pipeline(&config)?;
    let map = pipeline.translation_map(false)?;

    let raw = fs::read_to_string(&args.response)?;
    let response: RawResponse = serde_json::from_str(&raw)?;
    let translated = translate(&response, &map);
    let request = build_request(&translated)?;

    let output = json!({ "translated": translated, "request": request });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
