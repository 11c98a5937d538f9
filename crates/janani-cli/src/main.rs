mod ask_cmd;
mod config;
mod schedule_cmd;
mod serve_cmd;

use clap::{Parser, Subcommand};

use janani_core::language::Language;

use config::JananiConfig;

#[derive(Parser)]
#[command(name = "janani", about = "Antenatal-care assistant over chat and phone")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a janani config file
    Init {
        /// Anthropic API key (omit to run with offline answers only)
        #[arg(long)]
        api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Run the chat API and voice webhooks
    Serve {
        /// Address to bind (overrides JANANI_BIND and the config file)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides JANANI_PORT and the config file)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Answer one question locally
    Ask {
        /// The question, e.g. "What tests do I need?"
        question: String,
        /// Current week of pregnancy
        #[arg(long)]
        week: Option<u32>,
        /// Answer language: english or hindi
        #[arg(long)]
        language: Option<Language>,
        /// Name to address the caller by
        #[arg(long)]
        name: Option<String>,
    },
    /// Print the ANC test schedule
    Schedule {
        /// Show only the tests for this pregnancy week
        #[arg(long)]
        week: Option<u32>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Execute the `janani init` command: write config file.
fn cmd_init(api_key: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let has_key = api_key.is_some();
    let cfg = config::ConfigFile {
        server: config::ServerSection {
            bind: Some(config::DEFAULT_BIND.to_string()),
            port: Some(config::DEFAULT_PORT),
        },
        llm: config::LlmSection {
            api_key,
            ..Default::default()
        },
        ..Default::default()
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  server = {}:{}", config::DEFAULT_BIND, config::DEFAULT_PORT);
    if has_key {
        println!("  llm.api_key = (set)");
    } else {
        println!("  llm.api_key = (not set; answers will use the offline fallback)");
    }
    println!();
    println!("Next: run `janani serve` and point your Twilio number at /voice/incoming.");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { api_key, force } => {
            cmd_init(api_key, force)?;
        }
        Commands::Serve { bind, port } => {
            let resolved = JananiConfig::resolve(bind.as_deref(), port)?;
            serve_cmd::run_serve(resolved).await?;
        }
        Commands::Ask {
            question,
            week,
            language,
            name,
        } => {
            let resolved = JananiConfig::resolve(None, None)?;
            let options = ask_cmd::AskOptions {
                week,
                language,
                name,
            };
            ask_cmd::run_ask(&resolved, &question, &options).await?;
        }
        Commands::Schedule { week, json } => {
            schedule_cmd::run_schedule(week, json)?;
        }
    }

    Ok(())
}
