use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use forecaster::{
    commands::{audit, batch, migrate, predict},
    config::{settings_from_env, ForecastSettings},
    context::{AppContext, TrainerChoice},
    models::{Market, PredictionRequest},
};
use log::info;

#[derive(Parser)]
#[command(name = "forecaster")]
#[command(about = "Ridge-regression stock price forecaster")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast the closing price of one ticker on a future date
    Predict {
        #[arg(long)]
        ticker: String,
        /// NASDAQ, NYSE or TSX
        #[arg(long)]
        market: String,
        /// Date to forecast (YYYY-MM-DD), strictly after today
        #[arg(long = "target-date")]
        target_date: String,
        /// Skip writing the prediction log
        #[arg(long)]
        no_persist: bool,
        #[arg(long, value_enum, default_value_t = TrainerChoice::Auto)]
        trainer: TrainerChoice,
    },
    /// Forecast a list of tickers sequentially and log every prediction
    Batch {
        #[arg(long)]
        market: Market,
        /// Comma separated list of tickers; defaults to AAPL,MSFT,GOOGL,AMZN,NVDA
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        tickers: Vec<String>,
        #[arg(long = "days-ahead", default_value_t = batch::DEFAULT_DAYS_AHEAD)]
        days_ahead: u32,
        /// Pause between tickers in seconds
        #[arg(long = "delay-secs", default_value_t = batch::DEFAULT_DELAY_SECS)]
        delay_secs: u64,
        #[arg(long, value_enum, default_value_t = TrainerChoice::Auto)]
        trainer: TrainerChoice,
    },
    /// Record actual closes for logged predictions whose target date has passed
    Audit {
        /// Score predictions due on or before this date (defaults to today)
        #[arg(long = "as-of")]
        as_of: Option<NaiveDate>,
    },
    /// Create the prediction tables if they do not exist
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();

    let settings = ForecastSettings::from_settings_map(&settings_from_env())?;
    if settings.database_url.is_none() && command_requires_database(&command) {
        return Err(anyhow!("DATABASE_URL must be set for this command."));
    }
    let app_context = AppContext::initialize(settings).await?;

    info!("Starting forecaster. Not financial advice.");

    match command {
        Commands::Predict {
            ticker,
            market,
            target_date,
            no_persist,
            trainer,
        } => {
            let request = PredictionRequest::new(&ticker, &market, &target_date);
            predict::run(&app_context, request, !no_persist, trainer).await?;
        }
        Commands::Batch {
            market,
            tickers,
            days_ahead,
            delay_secs,
            trainer,
        } => {
            batch::run(
                &app_context,
                market,
                &tickers,
                days_ahead,
                delay_secs,
                trainer,
            )
            .await?;
        }
        Commands::Audit { as_of } => {
            audit::run(&app_context, as_of).await?;
        }
        Commands::Migrate => {
            migrate::run(&app_context).await?;
        }
    }

    Ok(())
}

fn command_requires_database(command: &Commands) -> bool {
    match command {
        Commands::Audit { .. } | Commands::Migrate => true,
        Commands::Predict { .. } | Commands::Batch { .. } => false,
    }
}
