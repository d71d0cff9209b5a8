//! ws-mock-server - CLI Entry Point
//!
//! Loads, validates and inspects a mock service configuration.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use ws_mock_server::{MockEngine, ResponseBody};

#[derive(Parser, Debug)]
#[command(
    name = "ws-mock-server",
    about = "SOAP/REST stub server - scheduled responses, request recording and WSDL-derived defaults",
    version
)]
struct Args {
    /// Path to configuration file (.yaml or .properties)
    #[arg(short, long, default_value = "mock-server.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// List services and operations
    #[arg(long)]
    list: bool,

    /// Print the WSDL of a service
    #[arg(long, value_name = "SERVICE")]
    wsdl: Option<String>,

    /// Print the default response of an operation
    #[arg(long, num_args = 2, value_names = ["SERVICE", "OPERATION"])]
    sample: Option<Vec<String>>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        let default_config = include_str!("../config/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    }
    info!(path = ?args.config, "Loading configuration");
    let engine = MockEngine::from_file(&args.config)?;
    let configuration = engine.configuration();

    if args.validate {
        println!(
            "Configuration is valid ({} services, {} operations)",
            configuration.service_count(),
            configuration.operation_count()
        );
        return Ok(());
    }

    if let Some(service) = &args.wsdl {
        println!("{}", engine.wsdl(service)?);
        return Ok(());
    }

    if let Some([service, operation]) = args.sample.as_deref() {
        let operation = configuration.operation(service, operation)?;
        match &operation.default_response().body {
            ResponseBody::Text(text) => println!("{}", text),
            ResponseBody::Binary(bytes) => println!("<{} bytes of binary content>", bytes.len()),
            ResponseBody::Empty => println!("<empty>"),
        }
        return Ok(());
    }

    if !args.list {
        println!(
            "Loaded {} services with {} operations (use --list for details)",
            configuration.service_count(),
            configuration.operation_count()
        );
        return Ok(());
    }

    for service in configuration.services() {
        println!(
            "{} ({}){}{}",
            service.name(),
            service.kind(),
            if service.wsdl().is_some() { " wsdl" } else { "" },
            if service.resource_paths_enabled() { " resource-paths" } else { "" },
        );
        for (index, operation) in service.operations() {
            println!(
                "  [{}] {} -> {} {} ({})",
                index,
                operation.name(),
                operation.response_code(),
                operation.response_content_type(),
                if operation.is_binary() { "binary" } else { "text" },
            );
        }
    }
    Ok(())
}
