use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use snapgrid_core::{GridConfig, GridSession, ImageFetcher};
use snapgrid_search::{FlickrClient, HttpImageFetcher, PhotoSize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
mod driver;

use config::AppConfig;
use driver::ScrollPlan;

/// Query used when no tags are given
const DEFAULT_TAGS: &str = "cat, cats, kitten";

fn cli() -> Command {
    Command::new("snapgrid")
        .version(snapgrid_core::VERSION)
        .about("Photo search grid with lazy, deduplicated image downloads")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML config file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("search")
                .about("Search photos by tag and download the visible ones")
                .arg(Arg::new("tags").default_value(DEFAULT_TAGS).help("Search tags"))
                .arg(
                    Arg::new("visible")
                        .long("visible")
                        .default_value("20")
                        .value_parser(value_parser!(usize))
                        .help("Number of slots to make visible"),
                )
                .arg(
                    Arg::new("pages")
                        .long("pages")
                        .default_value("3")
                        .value_parser(value_parser!(u32))
                        .help("Maximum result pages to request"),
                )
                .arg(
                    Arg::new("size")
                        .long("size")
                        .value_parser(value_parser!(PhotoSize))
                        .help("Photo size code (o k h b c z - n m t q s)"),
                )
                .arg(
                    Arg::new("api-key")
                        .long("api-key")
                        .help("Search API key (overrides FLICKR_API_KEY)"),
                )
                .arg(
                    Arg::new("max-concurrent")
                        .long("max-concurrent")
                        .value_parser(value_parser!(usize))
                        .help("Maximum downloads in flight"),
                )
                .arg(
                    Arg::new("thumbnail")
                        .long("thumbnail")
                        .value_parser(value_parser!(u32))
                        .help("Shrink decoded images to this longest edge"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(Command::new("config").about("Print the effective configuration"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Command-line flags win over file and environment
fn apply_flags(mut config: AppConfig, args: &ArgMatches) -> AppConfig {
    if let Some(size) = args.get_one::<PhotoSize>("size") {
        config.search.photo_size = *size;
    }
    if let Some(key) = args.get_one::<String>("api-key") {
        config.search.api_key = Some(key.clone());
    }
    if let Some(max) = args.get_one::<usize>("max-concurrent") {
        config.grid.max_concurrent_fetches = *max;
    }
    if let Some(edge) = args.get_one::<u32>("thumbnail") {
        config.grid.thumbnail_size = Some(*edge);
    }
    config
}

/// How long the driver waits for slot updates: one fetch deadline plus slack
fn update_wait(grid: &GridConfig) -> Duration {
    grid.fetch_timeout().saturating_add(Duration::from_secs(5))
}

async fn search(config: AppConfig, args: &ArgMatches) -> anyhow::Result<()> {
    let tags = args
        .get_one::<String>("tags")
        .context("tags are required")?;
    let plan = ScrollPlan {
        visible: args.get_one::<usize>("visible").copied().unwrap_or(20),
        max_pages: args.get_one::<u32>("pages").copied().unwrap_or(3),
        wait: update_wait(&config.grid),
    };

    let client = FlickrClient::new(config.search.clone())
        .context("set FLICKR_API_KEY, --api-key or search.api_key in the config file")?;
    let fetcher: Arc<dyn ImageFetcher> = Arc::new(HttpImageFetcher::new());
    let (session, mut updates) = GridSession::new(fetcher, config.grid.clone())?;

    let report = driver::run(&session, &mut updates, &client, tags, plan).await?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let config_path = matches.get_one::<PathBuf>("config").cloned();
    let config = AppConfig::load(config_path.as_deref())?;

    match matches.subcommand() {
        Some(("search", args)) => search(apply_flags(config, args), args).await,
        Some(("config", _)) => {
            print!("{}", config.to_toml_redacted()?);
            Ok(())
        }
        _ => Ok(()),
    }
}
