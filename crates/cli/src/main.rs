use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hlmcp_bridge::ProcessBridge;
use hlmcp_core::{BridgeConfig, BridgeExecutor, Config, Network, SettingsFile};
use hlmcp_server::{serve_stdio, AppState, ResourceCatalog, ToolName};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "hyperliquid-mcp")]
#[command(about = "MCP server exposing Hyperliquid market data and trading over stdio")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Log output format. Logs always go to stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Private key used by the bridge to sign requests
    #[arg(long, env = "HYPERLIQUID_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Account address, if different from the signing wallet
    #[arg(long, env = "HYPERLIQUID_ACCOUNT_ADDRESS")]
    account_address: Option<String>,

    /// Network to trade on (mainnet, testnet)
    #[arg(long, env = "HYPERLIQUID_NETWORK", default_value_t = Network::Mainnet)]
    network: Network,

    /// TOML settings file with a [bridge] section
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Executable that runs the SDK bridge (default: python3)
    #[arg(long, env = "HYPERLIQUID_BRIDGE_PROGRAM")]
    bridge_program: Option<String>,

    /// Argument placed before the bridge command; repeat for several
    #[arg(long = "bridge-arg", allow_hyphen_values = true)]
    bridge_args: Vec<String>,

    /// Kill a bridge call after this many seconds (unlimited by default)
    #[arg(long)]
    bridge_timeout_secs: Option<u64>,

    /// Maximum number of bridge processes running at once (unlimited by default)
    #[arg(long)]
    max_concurrent_calls: Option<usize>,

    /// Seconds in-flight requests get to finish after input stops
    #[arg(long, default_value = "5")]
    shutdown_grace_secs: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP on stdin/stdout (default)
    Serve,

    /// List available tools and their required arguments
    Tools,

    /// List available resources and resource templates
    Resources,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Stdout carries protocol frames only, so logs go to stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    match cli.command {
        Some(Commands::Tools) => list_tools(),
        Some(Commands::Resources) => list_resources(),
        Some(Commands::Serve) | None => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            let result = runtime.block_on(serve(cli));
            // A pending stdin read would otherwise keep the runtime alive after ctrl-c
            runtime.shutdown_timeout(Duration::from_millis(100));
            result
        }
    }
}

async fn serve(cli: Cli) -> Result<()> {
    let bridge = bridge_config(&cli)?;
    let config = Config::new(
        cli.secret_key.unwrap_or_default(),
        cli.account_address,
        cli.network,
        bridge,
    )?;

    tracing::info!(
        network = %config.network(),
        account = config.account_address().unwrap_or("<signer>"),
        program = %config.bridge().program,
        timeout_secs = ?config.bridge().timeout_secs,
        max_concurrent_calls = ?config.bridge().max_concurrent_calls,
        "Starting Hyperliquid MCP server"
    );

    let executor: Arc<dyn BridgeExecutor> = Arc::new(ProcessBridge::new(config.bridge()));
    let state = Arc::new(AppState::new(Arc::new(config), executor)?);

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received ctrl-c"),
            Err(e) => {
                tracing::warn!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    serve_stdio(state, Duration::from_secs(cli.shutdown_grace_secs), shutdown).await?;
    tracing::info!("Server stopped");
    Ok(())
}

/// Defaults, then the settings file, then flags.
fn bridge_config(cli: &Cli) -> Result<BridgeConfig> {
    let mut bridge = match &cli.config {
        Some(path) => SettingsFile::load(path)?.bridge,
        None => BridgeConfig::default(),
    };

    if let Some(program) = &cli.bridge_program {
        bridge.program = program.clone();
    }
    if !cli.bridge_args.is_empty() {
        bridge.args = cli.bridge_args.clone();
    }
    if cli.bridge_timeout_secs.is_some() {
        bridge.timeout_secs = cli.bridge_timeout_secs;
    }
    if cli.max_concurrent_calls.is_some() {
        bridge.max_concurrent_calls = cli.max_concurrent_calls;
    }
    Ok(bridge)
}

fn list_tools() -> Result<()> {
    println!("Available tools:");
    for tool in ToolName::iter() {
        let descriptor = tool.descriptor();
        println!("  {:<20} {}", descriptor.name, descriptor.description);
        println!(
            "  {:<20} required: {}",
            "",
            descriptor.input_schema.required.join(", ")
        );
    }
    Ok(())
}

fn list_resources() -> Result<()> {
    let catalog = ResourceCatalog::new()?;
    println!("Resources:");
    for resource in catalog.list_resources() {
        println!("  {:<45} {}", resource.uri, resource.name);
    }
    println!("Resource templates:");
    for template in catalog.list_resource_templates() {
        println!("  {:<45} {}", template.uri_template, template.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "hyperliquid-mcp",
            "--secret-key",
            "0xkey",
            "--network",
            "testnet",
            "--bridge-arg",
            "bridge.py",
            "--max-concurrent-calls",
            "4",
        ])
        .unwrap();
        assert_eq!(cli.network, Network::Testnet);
        assert!(cli.command.is_none());

        let bridge = bridge_config(&cli).unwrap();
        assert_eq!(bridge.program, "python3");
        assert_eq!(bridge.args, vec!["bridge.py"]);
        assert_eq!(bridge.max_concurrent_calls, Some(4));
        assert_eq!(bridge.timeout_secs, None);
    }

    #[test]
    fn test_flags_override_settings_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[bridge]\nprogram = \"/opt/venv/bin/python\"\nargs = [\"-u\", \"bridge.py\"]\ntimeout_secs = 30"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from([
            "hyperliquid-mcp",
            "--config",
            path.as_str(),
            "--bridge-timeout-secs",
            "10",
            "serve",
        ])
        .unwrap();
        let bridge = bridge_config(&cli).unwrap();
        assert_eq!(bridge.program, "/opt/venv/bin/python");
        assert_eq!(bridge.args, vec!["-u", "bridge.py"]);
        assert_eq!(bridge.timeout_secs, Some(10));
    }

    #[test]
    fn test_invalid_network_rejected() {
        assert!(Cli::try_parse_from(["hyperliquid-mcp", "--network", "devnet"]).is_err());
    }
}
