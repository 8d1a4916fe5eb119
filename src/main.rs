mod cli;

use ull_relay::{config, server, streaming};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "ull_relay=trace,tower_http=debug".to_string()
        } else {
            "ull_relay=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start {
            host,
            port,
            autostart,
        } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;

            // Override from CLI if specified
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if autostart {
                config.transcoder.autostart = true;
            }
            config::validate_config(&config)?;

            tracing::info!("Starting ull-relay");
            tracing::info!(
                "Server will listen on {}:{}",
                config.server.host,
                config.server.port
            );

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(server::start_server(config))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Classify { filenames } => {
            classify_files(&filenames);
            Ok(())
        }
        Commands::Version => {
            println!("ull-relay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Eviction delay: {}s", config.cache.eviction_secs);
    println!(
        "  Pump: poll every {}ms, give up after {}s idle",
        config.pump.poll_interval_ms, config.pump.max_idle_secs
    );
    println!(
        "  Transcoder: {} ({} args, autostart: {})",
        config.transcoder.program,
        config.transcoder.args.len(),
        config.transcoder.autostart
    );

    Ok(())
}

fn classify_files(filenames: &[String]) {
    for filename in filenames {
        let class = streaming::classify(filename);
        print!("{}: {:?}", filename, class.kind);
        if class.temp_cached {
            print!(" [temp-cached]");
        }
        if let Some(content_type) = class.content_type() {
            print!(" ({})", content_type);
        }
        println!();
    }
}
