//! d-msgraph CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use msgraph_core::{OutputFormat, TracingConfig, init_tracing};

use msgraph_client::cli::{AuthAction, CalendarAction, Cli, Command, ConfigAction, MailAction};
use msgraph_client::commands;
use msgraph_client::config::ConfigFile;
use msgraph_client::context::AppContext;
use msgraph_client::error::{ClientResult, report};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let tracing_config = if verbose {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e, verbose);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = ConfigFile::default_path()?;
    let config = ConfigFile::load_from(&config_path);
    let overrides = cli.overrides();
    let format: OutputFormat = cli.format.into();
    let verbose = cli.verbose;
    let context = |config: &ConfigFile| AppContext::new(&overrides, config, format, verbose);

    match cli.command {
        Command::Auth { action } => {
            let ctx = context(&config)?;
            match action {
                AuthAction::Login { client_credentials } => {
                    commands::auth::login(&ctx, client_credentials).await
                }
                AuthAction::Logout => commands::auth::logout(&ctx),
                AuthAction::Status => commands::auth::status(&ctx).await,
            }
        }
        Command::Mail { action } => {
            let ctx = context(&config)?;
            match action {
                MailAction::List(args) => commands::mail::list(&ctx, args).await,
                MailAction::Read { message_id } => commands::mail::read(&ctx, &message_id).await,
                MailAction::Send(args) => commands::mail::send(&ctx, args).await,
            }
        }
        Command::Calendar { action } => {
            let ctx = context(&config)?;
            match action {
                CalendarAction::List(args) => commands::calendar::list(&ctx, args).await,
                CalendarAction::Get { event_id, timezone } => {
                    commands::calendar::get(&ctx, &event_id, timezone.as_deref()).await
                }
                CalendarAction::Add(args) => commands::calendar::add(&ctx, args).await,
                CalendarAction::Edit(args) => commands::calendar::edit(&ctx, args).await,
                CalendarAction::Calendars => commands::calendar::calendars(&ctx).await,
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&config_path, &config),
            ConfigAction::Set { key, value } => {
                commands::config::set(&config_path, config, &key, &value)
            }
            ConfigAction::Unset { key } => commands::config::unset(&config_path, config, &key),
            ConfigAction::Path => commands::config::path(&config_path),
        },
    }
}
