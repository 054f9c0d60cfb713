use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use signrelay::app::{Mode, apply_endpoints, run};
use signrelay::cli::{Cli, Commands};
use signrelay::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Gesture { endpoints } => {
            let config = apply_endpoints(config, Mode::Gesture, &endpoints);
            log::info!("signrelay {} (gesture → speech)", signrelay::version_string());
            run(config, Mode::Gesture).await?;
        }
        Commands::Speech { endpoints } => {
            let config = apply_endpoints(config, Mode::Speech, &endpoints);
            log::info!("signrelay {} (speech → sign video)", signrelay::version_string());
            run(config, Mode::Speech).await?;
        }
        Commands::CheckConfig => {
            config.validate().context("Invalid configuration")?;
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{}", rendered);
        }
    }

    Ok(())
}

/// `-v` / `-vv` win over `RUST_LOG`; without them `RUST_LOG` applies, else info.
fn init_logging(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    builder.format_timestamp_millis().init();
}

fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        // Try default path, fall back to defaults
        let default_path = Config::default_path();
        Config::load_or_default(&default_path)
            .with_context(|| format!("Failed to load config from {}", default_path.display()))?
    };

    // Apply environment variable overrides
    Ok(config.with_env_overrides())
}
