use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "umbra",
    version,
    about = "Umbra - DNS proxy with per-client ad, tracker and malware blocking"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the DNS proxy (default when no subcommand given)
    Run,

    /// Validate config file syntax and semantics
    Check,

    /// Generate a sample config file
    Generate {
        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Check) => cmd_check(&cli.config),
        Some(Commands::Generate { output }) => cmd_generate(output.as_deref()),
        Some(Commands::Run) | None => cmd_run(&cli.config).await,
    }
}

async fn cmd_run(config_path: &str) -> Result<()> {
    let config = umbra::config::load_config(config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log.level.clone())),
        )
        .init();

    info!("umbra starting...");

    let app = umbra::app::App::new(config).await?;
    app.run().await?;

    Ok(())
}

fn cmd_check(config_path: &str) -> Result<()> {
    match umbra::config::load_config(config_path) {
        Ok(config) => {
            println!("config '{}' is valid", config_path);
            println!("  listen:          {}", config.listen);
            println!("  upstream:        {}", config.upstream.address);
            println!("  blacklist groups: {}", config.blocking.black_lists.len());
            println!("  whitelist groups: {}", config.blocking.white_lists.len());
            println!(
                "  client mappings:  {}",
                config.blocking.client_groups_block.len()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("config '{}' has errors:", config_path);
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_generate(output: Option<&str>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, SAMPLE_CONFIG)?;
            println!("written to '{}'", path);
        }
        None => {
            print!("{}", SAMPLE_CONFIG);
        }
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# Umbra sample configuration
log:
  level: info

listen: "0.0.0.0:53"

upstream:
  # ip[:port], tls://ip[:port] or https://host/dns-query
  address: "1.1.1.1"

caching:
  # minutes; 0 = no lower clamp
  min_caching_time: 5
  # minutes; 0 = no upper clamp, negative = caching disabled
  max_caching_time: 0

blocking:
  black_lists:
    ads:
      - https://raw.githubusercontent.com/StevenBlack/hosts/master/hosts
    special:
      - https://hosts-file.net/ad_servers.txt
  white_lists:
    ads:
      - /etc/umbra/whitelist.txt
  client_groups_block:
    default: [ads, special]
    laptop.fritz.box: [ads]
    192.168.178.0/24: [ads]
  # ZeroIP or NxDomain
  block_type: ZeroIP
  # minutes; 0 = default 4h, negative = load lists only once
  refresh_period: 0

api:
  listen: "127.0.0.1"
  port: 4000
"#;
