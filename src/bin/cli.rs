//! Infoscreen CLI
//!
//! Command-line interface for a running infoscreen server:
//! - Show the display as text
//! - List events and menus
//! - Check polling status and trigger refreshes
//! - Generate a default config file

use clap::{Parser, Subcommand};
use infoscreen::api::dto::{ChangesResponse, HealthResponse, RefreshResponse, SourcesResponse};
use infoscreen::sources::{Event, RestaurantMenu};
use infoscreen::{render_text, DisplayModel};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "infoscreen-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect and control an infoscreen server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8082", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,

    /// Time zone for printed times
    #[arg(long, default_value = "Europe/Helsinki", global = true)]
    pub timezone: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render the display as text
    Show {
        /// Keep redrawing whenever the display changes
        #[arg(short, long)]
        watch: bool,
    },

    /// List upcoming events
    Events,

    /// Show today's menu for a restaurant
    Menu {
        /// Restaurant slug (exactum, chemicum, ...)
        restaurant: String,
    },

    /// Show server and polling status
    Status,

    /// Poll a source right now
    Refresh {
        /// Source name as listed by `status`
        source: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let tz: chrono_tz::Tz = cli
        .timezone
        .parse()
        .map_err(|_| format!("Unknown time zone: {}", cli.timezone))?;

    match cli.command {
        Commands::Show { watch } => {
            let mut model = fetch_display(&client, &cli.api_url).await?;
            print_display(&model, &cli.format, tz)?;

            while watch {
                let changes: ChangesResponse = client
                    .get(format!("{}/api/display/changes", cli.api_url))
                    .query(&[("after", model.revision)])
                    .send()
                    .await?
                    .json()
                    .await?;

                if changes.changed {
                    model = fetch_display(&client, &cli.api_url).await?;
                    println!();
                    println!("--- revision {} ---", model.revision);
                    print_display(&model, &cli.format, tz)?;
                }
            }
        }

        Commands::Events => {
            let response = client
                .get(format!("{}/api/events/upcoming", cli.api_url))
                .send()
                .await?;
            let response = check(response).await;
            let events: BTreeMap<String, Vec<Event>> = response.json().await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&events)?);
                return Ok(());
            }

            for (subtitle, events) in events {
                println!("{}", subtitle);
                if events.is_empty() {
                    println!("  (none)");
                }
                for event in events {
                    println!(
                        "  {}  {}",
                        event.starts.with_timezone(&tz).format("%a %d.%m. %H:%M"),
                        event.title
                    );
                    if let Some(opens) = event.registration_starts {
                        let closes = event
                            .registration_ends
                            .map(|c| c.with_timezone(&tz).format("%d.%m. %H:%M").to_string())
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "      registration {} → {}",
                            opens.with_timezone(&tz).format("%d.%m. %H:%M"),
                            closes
                        );
                    }
                }
            }
        }

        Commands::Menu { restaurant } => {
            let response = client
                .get(format!("{}/api/foodlists/{}", cli.api_url, restaurant))
                .send()
                .await?;
            let response = check(response).await;
            let menu: RestaurantMenu = response.json().await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&menu)?);
                return Ok(());
            }

            println!("{} ({})", menu.name, menu.date.format("%d.%m.%Y"));
            if let Some(hours) = &menu.lunch_hours {
                println!("Lunch {}", hours);
            }
            if !menu.has_food() {
                println!("No menu for today");
            }
            for group in menu.groups.iter().filter(|g| !g.items.is_empty()) {
                println!();
                println!("  {}", group.name.to_uppercase());
                for item in &group.items {
                    let tags: Vec<&str> = item
                        .meta
                        .diet
                        .iter()
                        .chain(item.meta.allergies.iter())
                        .map(String::as_str)
                        .collect();
                    if tags.is_empty() {
                        println!("    - {}", item.name);
                    } else {
                        println!("    - {} [{}]", item.name, tags.join(", "));
                    }
                }
            }
        }

        Commands::Status => {
            let response = client.get(format!("{}/health", cli.api_url)).send().await;

            let health: HealthResponse = match response {
                Ok(resp) if resp.status().is_success() => resp.json().await?,
                Ok(resp) => {
                    eprintln!("API returned error: {}", resp.status());
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Cannot connect to infoscreen API at {}", cli.api_url);
                    eprintln!("Error: {}", e);
                    eprintln!();
                    eprintln!("Start the server with: infoscreen");
                    std::process::exit(1);
                }
            };

            let response = client
                .get(format!("{}/api/sources", cli.api_url))
                .send()
                .await?;
            let sources: SourcesResponse = check(response).await.json().await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&sources)?);
                return Ok(());
            }

            println!("Infoscreen v{}", health.version);
            println!();
            println!("API Status: {}", health.status);
            println!("Poller:     {}", health.poller);
            println!("Revision:   {}", health.revision);
            println!("Uptime:     {}", format_duration(health.uptime_seconds));

            println!();
            println!("Sources:");
            for entry in &sources.schedule {
                println!("  {:<24} every {}", entry.name, format_duration(entry.interval_secs));
            }

            println!();
            println!("Datasets:");
            for dataset in &sources.datasets {
                let fetched = dataset
                    .fetched_at
                    .map(|t| t.with_timezone(&tz).format("%d.%m. %H:%M:%S").to_string())
                    .unwrap_or_else(|| "never".to_string());
                match &dataset.last_error {
                    Some(error) => println!(
                        "  {:<24} STALE  fetched {} ({} failures: {})",
                        dataset.name, fetched, dataset.failures, error
                    ),
                    None => println!("  {:<24} ok     fetched {}", dataset.name, fetched),
                }
            }
        }

        Commands::Refresh { source } => {
            let response = client
                .post(format!("{}/api/sources/{}/refresh", cli.api_url, source))
                .send()
                .await?;
            let refreshed: RefreshResponse = check(response).await.json().await?;
            println!("Refreshed {}: {}", refreshed.source, refreshed.status);
        }

        Commands::Config { output } => {
            let config = infoscreen::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

fn print_display(model: &DisplayModel, format: &str, tz: chrono_tz::Tz) -> Result<(), serde_json::Error> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(model)?);
    } else {
        print!("{}", render_text(model, tz));
    }
    Ok(())
}

async fn fetch_display(client: &reqwest::Client, api_url: &str) -> Result<DisplayModel, reqwest::Error> {
    let response = client.get(format!("{}/api/display", api_url)).send().await?;
    check(response).await.json().await
}

/// Exit with the server's error message on a non-success status
async fn check(response: reqwest::Response) -> reqwest::Response {
    if response.status().is_success() {
        return response;
    }

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    eprintln!("Request failed ({}): {}", status, text);
    std::process::exit(1);
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
