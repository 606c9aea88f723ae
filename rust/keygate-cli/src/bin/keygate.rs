use anyhow::Result;
use clap::Parser;
use keygate::{KeyGate, KeyGateConfig};
use keygate_cli::{
    cli::{KeyGateCli, run},
    console::ConsoleAuthenticator,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
pub async fn main() -> Result<()> {
    let cli = KeyGateCli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => KeyGateConfig::load(path)?,
        None => KeyGateConfig::default(),
    };

    let platform = ConsoleAuthenticator::new(&cli.enrollment);
    let keygate = KeyGate::open(config, platform, &cli.store).await?;
    tracing::debug!(store = %cli.store.display(), "Opened key store");

    match run(&keygate, cli.command).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            Ok(())
        }
        Err(error) => {
            eprintln!("{}: {error}", error.code());
            std::process::exit(1);
        }
    }
}
