//! rconpool - command-line RCON client
//!
//! Runs one console command against a Minecraft server, or fetches the
//! player list or a player's data and prints it as JSON.

use anyhow::{bail, Context};
use clap::Parser;
use rconpool::{CommandExecutor, ConnectionPool, PoolConfig, DEFAULT_HOST, DEFAULT_RCON_PORT};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Command-line options
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// RCON port
    #[arg(short, long, default_value_t = DEFAULT_RCON_PORT)]
    port: u16,

    /// RCON password
    #[arg(short = 'P', long, env = "RCON_PASSWORD", hide_env_values = true)]
    password: String,

    /// Print who is online
    #[arg(long, conflicts_with_all = ["player", "command"])]
    players: bool,

    /// Print a player's entity data
    #[arg(long, value_name = "NAME", conflicts_with = "command")]
    player: Option<String>,

    /// Print decoded responses as JSON
    #[arg(long)]
    json: bool,

    /// Seconds to wait for a command response
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Command to run, e.g. `say hello`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl Args {
    fn pool_config(&self) -> PoolConfig {
        PoolConfig::default().with_command_timeout(Duration::from_secs(self.timeout))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays clean for responses
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let pool = ConnectionPool::new(args.pool_config());
    let executor = CommandExecutor::new(pool.clone());
    debug!(host = %args.host, port = args.port, "Using RCON server");

    let result = run(&executor, &args).await;

    pool.shutdown();
    info!(
        commands = pool.stats().commands_sent.load(std::sync::atomic::Ordering::Relaxed),
        "Done"
    );
    result
}

async fn run(executor: &CommandExecutor, args: &Args) -> anyhow::Result<()> {
    let (host, port, password) = (args.host.as_str(), args.port, args.password.as_str());

    if args.players {
        let list = executor
            .list_players(host, port, password)
            .await
            .context("failed to list players")?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&list)?);
        } else {
            println!("{}/{} online", list.online, list.max);
            for name in &list.players {
                println!("  {}", name);
            }
        }
        return Ok(());
    }

    if let Some(name) = &args.player {
        let data = executor
            .player_data(host, port, password, name)
            .await
            .with_context(|| format!("failed to fetch data for {}", name))?;
        let Some(data) = data else {
            bail!("{} is not online or their data could not be read", name);
        };
        if args.json {
            println!("{}", serde_json::to_string_pretty(&data)?);
        } else {
            println!("{} ({})", data.name, data.game_mode_name());
            println!("  health: {} food: {}", data.health, data.food_level);
            println!(
                "  position: {:.2} {:.2} {:.2} in {}",
                data.position.x, data.position.y, data.position.z, data.dimension
            );
            println!("  xp level: {}", data.xp_level);
            println!("  inventory: {} stacks", data.inventory.len());
        }
        return Ok(());
    }

    if args.command.is_empty() {
        bail!("nothing to do: pass a command, --players or --player <NAME>");
    }

    let command = args.command.join(" ");
    let response = executor
        .execute_command(host, port, password, &command)
        .await
        .with_context(|| format!("command `{}` failed", command))?;
    if args.json {
        println!("{}", serde_json::to_string(&response)?);
    } else {
        println!("{}", response);
    }
    Ok(())
}
