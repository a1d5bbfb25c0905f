//! Concordia server
//!
//! Runs an all-AI game on the in-memory world and logs how it unfolds.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use concordia_protocol::{Notification, TileId};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use concordia_server::{GameConfig, HeadlessWorld, TurnController};

#[derive(Parser)]
#[command(name = "concordia-server")]
#[command(about = "Turn and diplomacy orchestration engine", version)]
struct Cli {
    /// YAML game configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of AI players
    #[arg(short, long, default_value_t = 4)]
    players: u8,

    /// Override the last turn of the game
    #[arg(short, long)]
    turns: Option<u32>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("concordia_server=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("concordia_server=info"))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    let mut config = match &cli.config {
        Some(path) => GameConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GameConfig::default(),
    };
    if let Some(turns) = cli.turns {
        config.end_turn = turns;
    }
    config.validate().context("invalid configuration")?;

    let mut world = HeadlessWorld::new().with_ai_builders();
    for i in 0..cli.players {
        world.add_city(concordia_protocol::PlayerId(i), TileId(u32::from(i) * 100));
    }

    let mut game = TurnController::new(config, world);
    for i in 0..cli.players {
        game.create_player(format!("AI {}", i + 1), true, None)?;
    }
    let mut notes = game.subscribe();
    let logger = tokio::spawn(async move {
        while let Some(note) = notes.recv().await {
            match note {
                Notification::TurnBegan { .. }
                | Notification::GameOver { .. }
                | Notification::TreatyChanged { .. }
                | Notification::PlayerDied { .. } => info!(?note, "notification"),
                _ => tracing::debug!(?note, "notification"),
            }
        }
    });

    info!("Concordia server v{}", env!("CARGO_PKG_VERSION"));
    game.start_game(true)?;
    let victory = game.run().await?;
    drop(game);
    logger.await?;

    match victory {
        Some(victory) => info!(
            kind = %victory.kind,
            winners = ?victory.winners,
            reason = %victory.reason,
            "finished"
        ),
        None => info!("game never started"),
    }
    Ok(())
}
