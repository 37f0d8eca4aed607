use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use vhostd::config::loader::load_config;
use vhostd::config::routes::load_routes;
use vhostd::config::VhostConfig;
use vhostd::vhost::HostDirectory;

#[derive(Parser)]
#[command(name = "vhostctl")]
#[command(about = "Inspect vhostd host routes and configuration", long_about = None)]
struct Cli {
    /// Host route source (rhai script or TOML).
    #[arg(short, long, global = true)]
    routes: Option<PathBuf>,

    /// Default document root for unmatched hosts.
    #[arg(long, global = true)]
    app: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List host patterns in match order
    Routes,
    /// Show the document root each host resolves to
    Resolve {
        hosts: Vec<String>,
    },
    /// Load and validate a server configuration file
    CheckConfig {
        path: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let output = match &cli.command {
        Commands::Routes => {
            let directory = build_directory(&cli)?;
            let routes: Vec<Value> = directory
                .entries()
                .map(|entry| {
                    json!({
                        "pattern": entry.pattern(),
                        "root": entry.root().display().to_string(),
                        "wildcard": entry.is_wildcard(),
                    })
                })
                .collect();
            json!({
                "routes": routes,
                "default_root": directory.default_root().display().to_string(),
            })
        }
        Commands::Resolve { hosts } => {
            let directory = build_directory(&cli)?;
            let resolved: serde_json::Map<String, Value> = hosts
                .iter()
                .map(|host| {
                    let root = directory.resolve(Some(host.as_str())).display().to_string();
                    (host.clone(), Value::String(root))
                })
                .collect();
            Value::Object(resolved)
        }
        Commands::CheckConfig { path } => match load_config(path) {
            Ok(config) => json!({ "valid": true, "bind_address": config.listener.bind_address }),
            Err(e) => {
                println!("{}", serde_json::to_string_pretty(&json!({ "valid": false, "error": e.to_string() }))?);
                std::process::exit(1);
            }
        },
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn build_directory(cli: &Cli) -> Result<HostDirectory, Box<dyn std::error::Error>> {
    let config = VhostConfig {
        routes_path: cli.routes.clone(),
        app: cli.app.clone(),
        ..VhostConfig::default()
    };
    let mut directory = HostDirectory::from_config(&config);

    if let Some(path) = &config.routes_path {
        let report = directory.reload(load_routes(path)?);
        for rejection in &report.rejected {
            eprintln!("warning: {}", rejection);
        }
    }
    Ok(directory)
}
