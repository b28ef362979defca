//! crosspost: scheduled multi-platform publishing engine.
//!
//! Main binary with subcommands:
//! - `serve`: run the scheduler and the campaign control API

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod serve;

#[derive(Parser)]
#[command(name = "crosspost")]
#[command(about = "Scheduled multi-platform publishing engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and the campaign control API
    Serve {
        /// Address the control API binds to
        #[arg(long, env = "CROSSPOST_BIND", default_value = "127.0.0.1:8080")]
        bind: String,

        /// Scheduler tick interval in seconds
        #[arg(long, default_value = "300")]
        tick_interval: u64,

        /// Minutes after which a dangling publishing claim is reclaimed
        #[arg(long, default_value = "30")]
        reclaim_minutes: i64,

        /// Minutes a resolved token stays cached
        #[arg(long, default_value = "10")]
        token_cache_minutes: i64,

        /// Seconds between media-processing status polls
        #[arg(long, default_value = "2")]
        poll_interval: u64,

        /// Maximum media-processing status polls before timing out
        #[arg(long, default_value = "30")]
        poll_attempts: u32,

        /// Instagram API base URL
        #[arg(long, env = "CROSSPOST_INSTAGRAM_API_URL")]
        instagram_api_url: Option<String>,

        /// Instagram access token
        #[arg(long, env = "CROSSPOST_INSTAGRAM_TOKEN", hide_env_values = true)]
        instagram_token: Option<String>,

        /// Facebook API base URL
        #[arg(long, env = "CROSSPOST_FACEBOOK_API_URL")]
        facebook_api_url: Option<String>,

        /// Facebook access token
        #[arg(long, env = "CROSSPOST_FACEBOOK_TOKEN", hide_env_values = true)]
        facebook_token: Option<String>,

        /// Twitter API base URL
        #[arg(long, env = "CROSSPOST_TWITTER_API_URL")]
        twitter_api_url: Option<String>,

        /// Twitter access token
        #[arg(long, env = "CROSSPOST_TWITTER_TOKEN", hide_env_values = true)]
        twitter_token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            tick_interval,
            reclaim_minutes,
            token_cache_minutes,
            poll_interval,
            poll_attempts,
            instagram_api_url,
            instagram_token,
            facebook_api_url,
            facebook_token,
            twitter_api_url,
            twitter_token,
        } => {
            serve::run(serve::ServeConfig {
                bind,
                tick_interval,
                reclaim_minutes,
                token_cache_minutes,
                poll_interval,
                poll_attempts,
                instagram_api_url,
                instagram_token,
                facebook_api_url,
                facebook_token,
                twitter_api_url,
                twitter_token,
            })
            .await
        }
    }
}
