mod search;

use clap::{Parser, Subcommand, ValueEnum};
use mapcrawl_core::{parse_coordinates, RankBy};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mapcrawl-cli")]
#[command(about = "Crawl a map provider for places near a point and rank them")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search one center, serving from cache when a nearby crawl exists.
    Search {
        #[arg(long)]
        term: String,
        /// Center as "lat, lng".
        #[arg(long, value_parser = parse_center, allow_hyphen_values = true)]
        near: (f64, f64),
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Search several centers and score the combined results as one set.
    Multi {
        #[arg(long)]
        term: String,
        #[arg(
            long = "near",
            value_parser = parse_center,
            required = true,
            allow_hyphen_values = true
        )]
        near: Vec<(f64, f64)>,
        /// Measure every distance from this point instead of each center.
        #[arg(long, value_parser = parse_center, allow_hyphen_values = true)]
        reference: Option<(f64, f64)>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Debug, Clone, clap::Args)]
struct OutputArgs {
    /// Ignore cached results and crawl again.
    #[arg(long)]
    refresh: bool,
    #[arg(long, value_enum, default_value_t = RankArg::Composite)]
    rank_by: RankArg,
    #[arg(long, default_value_t = 10)]
    limit: usize,
    /// Print the ranked places as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RankArg {
    ScaledRating,
    ScaledDistRating,
    Vfm,
    Composite,
}

impl From<RankArg> for RankBy {
    fn from(arg: RankArg) -> Self {
        match arg {
            RankArg::ScaledRating => RankBy::ScaledRating,
            RankArg::ScaledDistRating => RankBy::ScaledDistRating,
            RankArg::Vfm => RankBy::Vfm,
            RankArg::Composite => RankBy::Composite,
        }
    }
}

fn parse_center(input: &str) -> Result<(f64, f64), String> {
    parse_coordinates(input).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse first so `--help` and usage errors work without any config.
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("nothing to do; try `mapcrawl-cli search --help`");
        return Ok(());
    };

    let config = mapcrawl_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match command {
        Commands::Search { term, near, output } => {
            search::run_search(&config, &term, near, &output).await?;
        }
        Commands::Multi {
            term,
            near,
            reference,
            output,
        } => {
            search::run_multi(&config, &term, &near, reference, &output).await?;
        }
    }

    Ok(())
}
