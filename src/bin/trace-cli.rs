use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "trace-cli")]
#[command(about = "Query CLI for the trace correlator collector", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:7070")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct one trace, oldest event first
    Trace {
        trace_id: String,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Follow page tokens until the trace is exhausted
        #[arg(long)]
        all: bool,
    },
    /// Services, spans and integrity of one trace
    Summary { trace_id: String },
    /// Search events by level, service and time range
    Events {
        #[arg(short, long)]
        level: Option<String>,
        #[arg(short, long)]
        service: Option<String>,
        /// RFC 3339 lower bound (inclusive)
        #[arg(long)]
        since: Option<String>,
        /// RFC 3339 upper bound (exclusive)
        #[arg(long)]
        until: Option<String>,
        /// Only the last N seconds
        #[arg(long)]
        last_secs: Option<u64>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        page_token: Option<String>,
    },
    /// Check collector status
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Trace { trace_id, limit, all } => {
            let url = format!("{}/v1/traces/{}", cli.url, trace_id);
            let mut token: Option<String> = None;
            loop {
                let mut query: Vec<(&str, String)> = Vec::new();
                if let Some(limit) = limit {
                    query.push(("limit", limit.to_string()));
                }
                if let Some(token) = &token {
                    query.push(("pageToken", token.clone()));
                }
                let res = client.get(&url).query(&query).send().await?;
                let Some(page) = read_json(res).await? else {
                    break;
                };
                if !all {
                    println!("{}", serde_json::to_string_pretty(&page)?);
                    break;
                }
                if let Some(events) = page["events"].as_array() {
                    for event in events {
                        println!("{}", serde_json::to_string(event)?);
                    }
                }
                match page["nextPageToken"].as_str() {
                    Some(next) => token = Some(next.to_string()),
                    None => break,
                }
            }
        }
        Commands::Summary { trace_id } => {
            let res = client
                .get(format!("{}/v1/traces/{}/summary", cli.url, trace_id))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Events {
            level,
            service,
            since,
            until,
            last_secs,
            limit,
            page_token,
        } => {
            let mut query: Vec<(&str, String)> = Vec::new();
            let optional = [
                ("level", level),
                ("service", service),
                ("since", since),
                ("until", until),
                ("lastSecs", last_secs.map(|s| s.to_string())),
                ("limit", limit.map(|l| l.to_string())),
                ("pageToken", page_token),
            ];
            for (key, value) in optional {
                if let Some(value) = value {
                    query.push((key, value));
                }
            }
            let res = client
                .get(format!("{}/v1/events", cli.url))
                .query(&query)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn read_json(res: reqwest::Response) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: collector returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(None);
    }
    Ok(Some(res.json().await?))
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(json) = read_json(res).await? {
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    Ok(())
}
