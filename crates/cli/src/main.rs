use std::sync::Arc;

use {
    anyhow::{Context, bail},
    clap::{Parser, Subcommand},
    secrecy::ExposeSecret,
    teloxide::Bot,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    subgate_panel::{DeviceLabel, Identity, PanelClient, ProvisionOutcome},
    subgate_telegram::BotContext,
};

#[derive(Parser)]
#[command(name = "subgate", about = "Subgate — VPN subscription bot for 3x-ui")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Telegram bot.
    Run,
    /// Provision an account directly, bypassing the bot.
    Provision {
        /// Telegram numeric user id recorded as the account owner.
        #[arg(long)]
        owner_id: u64,
        #[arg(long)]
        username: String,
        /// Optional device name; omitted for the primary device.
        #[arg(long)]
        device: Option<String>,
    },
    /// List an owner's subscriptions.
    Subscriptions {
        #[arg(long)]
        owner_id: u64,
        #[arg(long)]
        username: Option<String>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "subgate starting");

    let config = subgate_config::load()?;
    let client = Arc::new(PanelClient::new(config.panel.clone())?);

    match cli.command {
        Commands::Run => {
            let token = config
                .telegram
                .token
                .as_ref()
                .context("telegram bot token is not configured")?;
            let bot = Bot::new(token.expose_secret().clone());
            let ctx = Arc::new(BotContext {
                client,
                web_app_url: config.telegram.web_app_url.clone(),
            });
            subgate_telegram::run(bot, ctx).await;
            Ok(())
        },
        Commands::Provision {
            owner_id,
            username,
            device,
        } => {
            let identity = Identity::new(owner_id, Some(username));
            let outcome = client.create_account(&identity, device.as_deref()).await?;
            match outcome {
                ProvisionOutcome::Created { account, url } => {
                    println!("created {} -> {url}", account.email);
                    Ok(())
                },
                ProvisionOutcome::AlreadyExists { url: Some(url) } => {
                    println!("already exists -> {url}");
                    Ok(())
                },
                ProvisionOutcome::AlreadyExists { url: None } => {
                    bail!("account already exists but its subscription could not be resolved")
                },
                ProvisionOutcome::Rejected(reason) => bail!("provisioning rejected: {reason:?}"),
            }
        },
        Commands::Subscriptions { owner_id, username } => {
            let subs = client.list_by_owner(owner_id, username.as_deref()).await?;
            if subs.is_empty() {
                println!("no subscriptions");
                return Ok(());
            }
            for sub in subs {
                let label = match &sub.label {
                    DeviceLabel::Primary => "primary",
                    DeviceLabel::Named(name) => name.as_str(),
                };
                println!("{}\t{}\t{}", sub.email, label, sub.url);
            }
            Ok(())
        },
    }
}
