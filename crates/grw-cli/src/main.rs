use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use grw_core::{current_occurrence, predict_future_occurrences};
use grw_storage::DataStore;

#[derive(Debug, Parser)]
#[command(name = "grw-cli")]
#[command(about = "Game Reference Wiki command-line interface")]
struct Cli {
    /// Root directory of the game data files.
    #[arg(long, default_value = "data/games")]
    data_dir: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the wiki web server.
    Serve,
    /// List available games and their entity counts.
    Games,
    /// Show event statuses and predicted occurrences for a game.
    Events {
        game: String,
        /// Number of future occurrences to predict per recurring event.
        #[arg(long, default_value_t = 5)]
        count: usize,
        /// Reference time (RFC 3339); defaults to now.
        #[arg(long)]
        at: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let store = DataStore::new(&cli.data_dir);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            grw_web::serve_from_env().await?;
        }
        Commands::Games => {
            let games = store.list_games().await?;
            if games.is_empty() {
                println!("no games found under {}", cli.data_dir);
            }
            for meta in games {
                let mut total = 0;
                for category in &meta.categories {
                    total += store.entity_count(&meta.slug, &category.entity_type).await;
                }
                println!(
                    "{}: {} ({} categories, {} entries)",
                    meta.slug,
                    meta.name,
                    meta.categories.len(),
                    total
                );
            }
        }
        Commands::Events { game, count, at } => {
            let at: DateTime<Utc> = match at {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("parsing reference time {raw}"))?,
                None => Utc::now(),
            };

            let events = store.load_events(&game).await;
            if events.is_empty() {
                println!("no events found for {game}");
            }
            for event in events {
                let occurrence = current_occurrence(&event, at);
                println!(
                    "{} [{}] {} -> {}",
                    event.name,
                    occurrence.status,
                    occurrence.start_date.to_rfc3339(),
                    occurrence.end_date.to_rfc3339()
                );
                for prediction in predict_future_occurrences(&event, count, at) {
                    println!(
                        "  cycle {}: {} -> {} ({})",
                        prediction.cycle_index,
                        prediction.occurrence.start_date.to_rfc3339(),
                        prediction.occurrence.end_date.to_rfc3339(),
                        prediction.occurrence.status
                    );
                }
            }
        }
    }

    Ok(())
}
