mod cli;
mod core;
mod terminal;
#[cfg(test)]
mod test_fixtures;
mod tui;

use clap::Parser;
use cli::{Cli, Commands, WatchArgs};
use crate::core::models::DataPath;
use std::io;

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let data_path = DataPath::new(cli.data_path)?;

    match cli.command {
        Commands::Curve {
            seed,
            average_ms,
            target,
            steps,
        } => cli::handle_curve_command(&seed, average_ms, target, steps)?,
        Commands::Status { generation_id } => {
            cli::handle_status_command(&data_path, &generation_id).await?
        }
        Commands::Watch {
            generation_id,
            plain,
            strategy,
            average_ms,
            no_realtime,
            open,
        } => {
            let args = WatchArgs {
                generation_id,
                plain,
                strategy,
                average_ms,
                no_realtime,
                open,
            };
            cli::handle_watch_command(&data_path, &args).await?
        }
        Commands::Config { command } => cli::handle_config_command(&data_path, &command)?,
        Commands::Errors { command } => cli::handle_errors_command(&data_path, &command)?,
    }

    Ok(())
}
