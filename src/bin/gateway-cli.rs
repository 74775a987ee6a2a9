use clap::{Parser, Subcommand};
use edge_gateway::http::CORRELATION_HEADER;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Command-line client for a running edge gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Correlation ID to send with the request
    #[arg(long)]
    correlation_id: Option<String>,

    /// Header the gateway reads and echoes correlation IDs in
    #[arg(long, default_value = CORRELATION_HEADER)]
    correlation_header: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the gateway process itself
    Liveness,
    /// Show the aggregated health of every backend service
    Health,
    /// Request a bearer token
    Token {
        username: String,
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let request = match &cli.command {
        Commands::Liveness => client.get(format!("{}/health", cli.url)),
        Commands::Health => client.get(format!("{}/health/services", cli.url)),
        Commands::Token { username, password } => client
            .post(format!("{}/auth/token", cli.url))
            .json(&json!({ "username": username, "password": password })),
    };

    let request = match &cli.correlation_id {
        Some(id) => request.header(cli.correlation_header.as_str(), id),
        None => request,
    };

    print_response(request.send().await?, &cli.correlation_header).await
}

async fn print_response(res: reqwest::Response, correlation_header: &str) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if let Some(id) = res.headers().get(correlation_header).and_then(|v| v.to_str().ok()) {
        eprintln!("correlation id: {}", id);
    }

    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
