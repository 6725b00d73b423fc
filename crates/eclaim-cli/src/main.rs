mod cli;
mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use colored::Colorize;

use cli::{Cli, Commands, OutputFormat};
use client::EclaimClient;
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let profile = &cli.profile;
    let format = resolve_format(cli.format, profile);

    match &cli.command {
        Commands::Submit(args) => {
            let client = make_client(&cli.server, profile)?;
            commands::claims::submit(&client, args, format).await?;
        }
        Commands::Audit(args) => {
            let client = make_client(&cli.server, profile)?;
            commands::claims::audit(&client, args, format).await?;
        }
        Commands::List(args) => {
            let client = make_client(&cli.server, profile)?;
            commands::claims::list(&client, args.limit, format).await?;
        }
        Commands::Settings => {
            let client = make_client(&cli.server, profile)?;
            commands::claims::settings(&client, format).await?;
        }
        Commands::Status => {
            let server = config::resolve_server(&cli.server, profile)?;
            let client = EclaimClient::new(&server);
            commands::claims::status(&client, &server).await?;
        }
        Commands::Normalize(args) => commands::local::normalize(args, format)?,
        Commands::Seal(args) => commands::local::seal(args)?,
        Commands::Decrypt(args) => commands::local::decrypt(args, format)?,
        Commands::Sign(args) => commands::local::sign(args, format)?,
        Commands::Config(args) => match &args.command {
            cli::ConfigCommands::Show => {
                let cfg = config::load_profile(profile)?;
                println!("{}: {}", "Profile".cyan(), profile);
                println!(
                    "{}: {}",
                    "Server".cyan(),
                    cfg.server.as_deref().unwrap_or("(not set)")
                );
                println!(
                    "{}: {}",
                    "Format".cyan(),
                    cfg.format.as_deref().unwrap_or("json")
                );
            }
            cli::ConfigCommands::Set(set_args) => {
                let mut cfg = config::load_profile(profile)?;
                match set_args.key.as_str() {
                    "server" => cfg.server = Some(set_args.value.clone()),
                    "format" => {
                        if OutputFormat::from_str(&set_args.value, true).is_err() {
                            anyhow::bail!("Unknown format: {}. Valid formats: json, table", set_args.value);
                        }
                        cfg.format = Some(set_args.value.clone());
                    }
                    other => {
                        anyhow::bail!("Unknown config key: {other}. Valid keys: server, format")
                    }
                }
                config::save_profile(profile, &cfg)?;
                output::print_success(&format!("Set {} = {}", set_args.key, set_args.value));
            }
        },
    }

    Ok(())
}

/// `--format`, then the profile's format, then JSON.
fn resolve_format(flag: Option<OutputFormat>, profile: &str) -> OutputFormat {
    flag.or_else(|| {
        config::load_profile(profile)
            .ok()?
            .format
            .and_then(|f| OutputFormat::from_str(&f, true).ok())
    })
    .unwrap_or_default()
}

fn make_client(server: &Option<String>, profile: &str) -> Result<EclaimClient> {
    let server = config::resolve_server(server, profile)?;
    Ok(EclaimClient::new(&server))
}
