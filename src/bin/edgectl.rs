use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "edgectl")]
#[command(about = "Inspect a running edge router", long_about = None)]
struct Cli {
    /// Base URL of the entry point serving the API.
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// API key, if the router requires one.
    #[arg(short, long, env = "EDGE_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot version, counts and warnings
    Overview,
    /// List routers
    Routers {
        /// Only routers from this provider
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// List middlewares
    Middlewares,
    /// List services
    Services,
    /// Check the health endpoint
    Ping,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
    }

    let path = match &cli.command {
        Commands::Overview => "/api/overview".to_string(),
        Commands::Routers { provider: Some(provider) } => format!("/api/providers/{provider}/routers"),
        Commands::Routers { provider: None } => "/api/http/routers".to_string(),
        Commands::Middlewares => "/api/http/middlewares".to_string(),
        Commands::Services => "/api/http/services".to_string(),
        Commands::Ping => {
            let res = client.get(format!("{base}/ping")).send().await?;
            let status = res.status();
            println!("{} {}", status.as_u16(), res.text().await?.trim());
            if !status.is_success() {
                std::process::exit(1);
            }
            return Ok(());
        }
    };

    let res = client.get(format!("{base}{path}")).headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
