mod cli;
mod commands;
mod context;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, GroupCommand, UsageCommand};
use commands::*;
use context::Context;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut ctx = Context::open(&cli).await?;

    match cli.command {
        Command::Init {
            user_id,
            name,
            email,
        } => {
            cmd_init(&mut ctx, &user_id, &name, email.as_deref()).await?;
        }
        Command::Usage { usage_cmd } => match usage_cmd {
            UsageCommand::Add { seconds, date } => {
                cmd_usage_add(&ctx, seconds, date).await?;
            }
            UsageCommand::Today => {
                cmd_usage_today(&ctx).await?;
            }
            UsageCommand::Week => {
                cmd_usage_week(&ctx).await?;
            }
        },
        Command::Sync { daemon } => {
            cmd_sync(&ctx, daemon).await?;
        }
        Command::Group { group_cmd } => match group_cmd {
            GroupCommand::Create { name } => {
                cmd_group_create(&mut ctx, &name).await?;
            }
            GroupCommand::Join { group_id } => {
                cmd_group_join(&mut ctx, &group_id).await?;
            }
            GroupCommand::Leave { group_id } => {
                cmd_group_leave(&mut ctx, group_id.as_deref()).await?;
            }
            GroupCommand::List => {
                cmd_group_list(&ctx).await?;
            }
            GroupCommand::Use { group_id } => {
                cmd_group_use(&mut ctx, &group_id).await?;
            }
            GroupCommand::Show {
                group_id,
                date,
                watch,
            } => {
                cmd_group_show(&ctx, group_id.as_deref(), date, watch).await?;
            }
        },
    }

    Ok(())
}
