use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use edge_forwarder::{
    adapters::{HttpClientAdapter, HttpHandler},
    config::{ServerConfig, ServerConfigValidator, loader::load_config},
    core::{BackendCandidates, ForwardSettings, Forwarder},
    metrics,
    ports::http_client::HttpClient,
    tracing_setup,
    utils::GracefulShutdown,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Configuration file; missing files are skipped and env/defaults apply
    #[clap(short, long, default_value = "forwarder.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "forwarder.toml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "forwarder.toml")]
        config: String,
    },
    /// Start the forwarder (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "forwarder.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(&config).await,
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Serve { config }) => serve(&config).await,
        None => serve(&args.config).await,
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let config: ServerConfig = load_config(Some(config_path))
        .await
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    tracing_setup::init_tracing(&config.logging)
        .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;
    metrics::describe_metrics();

    ServerConfigValidator::validate(&config).context("Invalid configuration")?;

    let candidates = BackendCandidates::from_config(&config.backends)
        .context("Failed to build backend candidate list")?;
    if candidates.is_empty() {
        tracing::warn!(
            "No backend origins configured; every forwarded request will answer 502. \
             Set FORWARDER_BACKENDS__PRIMARY or the [backends] section."
        );
    }
    for (priority, origin) in candidates.iter().enumerate() {
        tracing::info!(
            priority,
            backend.url = %origin,
            backend.tls = origin.is_secure(),
            "Configured backend origin"
        );
    }

    let http_client: Arc<dyn HttpClient> = Arc::new(
        HttpClientAdapter::with_connect_timeout(config.connect_timeout_secs.map(Duration::from_secs))
            .context("Failed to create HTTP client adapter")?,
    );

    let forwarder = Arc::new(Forwarder::new(
        Arc::new(ForwardSettings::from(&config)),
        Arc::new(candidates),
        http_client,
    ));
    let app = HttpHandler::new(forwarder, config.max_body_bytes).router(&config.mount_path);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .context("Failed to parse listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!(
        mount_path = %config.mount_path,
        path_param = %config.path_param,
        header_policy = ?config.header_policy,
        "Edge forwarder listening on {}",
        addr
    );

    let graceful_shutdown = Arc::new(GracefulShutdown::new());
    let shutdown_signal = graceful_shutdown.wait_for_shutdown_signal();

    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_handler_shutdown.run_signal_handler().await {
            tracing::error!("Signal handler error: {}", e);
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal.await;
        })
        .await
        .context("Server error")?;

    tracing::info!("Graceful shutdown completed");
    Ok(())
}

/// Validate configuration file and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(Some(config_path)).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    match ServerConfigValidator::validate(&config) {
        Ok(()) => {
            let origins: Vec<_> = config.backends.ordered().collect();
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Mount Path: {}", config.mount_path);
            println!("   • Header Policy: {:?}", config.header_policy);
            println!("   • Backend Origins: {}", origins.len());
            for (slot, origin) in &origins {
                println!("       - {slot}: {origin}");
            }
            if origins.is_empty() {
                println!();
                println!("⚠️  No backend origins configured: every request will answer 502");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Ensure backend origins start with http:// or https://");
            println!("   • Verify listen address format (e.g., '127.0.0.1:3000')");
            println!("   • mount_path and upstream_prefix must start with '/'");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Edge Forwarder Configuration
#
# Every key can be overridden from the environment with the FORWARDER_ prefix and
# "__" between sections, e.g. FORWARDER_BACKENDS__PRIMARY=https://api.example.com

# The address to listen on
listen_addr = "127.0.0.1:8080"

# Inbound route the dashboard calls, and the query parameter naming the backend path
mount_path = "/api/proxy"
path_param = "path"

# Upstream URL shape: {origin}{upstream_prefix}/{path}
upstream_prefix = "/api"

# "allow_list" forwards only Authorization and Content-Type;
# "pass_through" forwards everything except Host, Connection and Content-Length
header_policy = "allow_list"

# Largest accepted inbound body, in bytes
max_body_bytes = 4718592

# connect_timeout_secs = 5

[logging]
level = "info"
format = "json"

# Backend origins, tried in this order; blank entries are skipped
[backends]
# primary = "https://api.example.com"
# fallback = "https://api-standby.example.com"
dns_fallback = "http://ec2-52-91-158-161.compute-1.amazonaws.com"
ip_fallback = "http://52.91.158.161"
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'edge-forwarder serve --config {config_path}' to start the forwarder");
    Ok(())
}
