//! Operator CLI for a running proxy instance.

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for quota-proxy", long_about = None)]
struct Cli {
    /// Base URL of the running proxy.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin path prefix the proxy was configured with.
    #[arg(long, default_value = "admin")]
    admin_path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check proxy liveness
    Status,
    /// Inspect the credits left for an application
    Credits {
        #[arg(long)]
        app_id: String,
        #[arg(long, default_value = "")]
        app_key: String,
        #[arg(long, default_value = "")]
        provider: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/status", cli.url))
                .send()
                .await?;
            println!("{} {}", res.status(), res.text().await?);
        }
        Commands::Credits {
            app_id,
            app_key,
            provider,
        } => {
            let res = client
                .get(format!("{}/{}/credits", cli.url, cli.admin_path))
                .query(&[
                    ("$app_id", app_id.as_str()),
                    ("$app_key", app_key.as_str()),
                    ("$provider", provider.as_str()),
                ])
                .send()
                .await?;

            let status = res.status();
            let json: Value = res.json().await?;
            if !status.is_success() {
                eprintln!("proxy answered {status}");
            }
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}
