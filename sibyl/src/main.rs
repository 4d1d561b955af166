use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sibyl::api::ApiServer;
use sibyl::{ChatSession, Services, Settings};

#[derive(Parser)]
#[command(name = "sibyl")]
#[command(about = "Knowledge-augmented chat orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// JWT secret key (can also use SIBYL_JWT_SECRET env var)
        #[arg(long)]
        jwt_secret: Option<String>,
    },

    /// Run a single question through the pipeline and print the answer
    Ask {
        /// The question to answer
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "sibyl=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env();

    match cli.command {
        Commands::Serve {
            host,
            port,
            jwt_secret,
        } => {
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            if let Some(secret) = jwt_secret {
                settings.jwt_secret = secret;
            }

            if settings.api_key.is_empty() {
                println!(
                    "Warning: SIBYL_API_KEY is not set; generation will rely on fallback answers."
                );
            }

            let services = Services::from_settings(&settings);
            let server = ApiServer::new(settings, services);
            server.start().await?;
        }

        Commands::Ask { question } => {
            let services = Services::from_settings(&settings);
            let mut session = ChatSession::new(services);
            let answer = session.process_message(&question).await;
            println!("{}", answer);
        }
    }

    Ok(())
}
