use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;
use website_test_bot::cli::commands::{build_launcher, cmd_crawl, cmd_generate, DatasetSource};
use website_test_bot::cli::config::{load_config, Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Crawl { url, overrides } => {
            overrides.apply(&mut config);
            config.validate()?;
            let launcher = build_launcher(cli.driver, &config, &cli.browser_script);
            cmd_crawl(&config, launcher, &url).await?;
        }
        Commands::Generate {
            url,
            dataset,
            output_dir,
            browsers,
            headed,
            overrides,
        } => {
            overrides.apply(&mut config);
            if !browsers.is_empty() {
                config.test.browsers = browsers;
            }
            if headed {
                config.test.headless = false;
            }
            config.validate()?;

            let source = match (url, dataset) {
                (Some(url), _) => DatasetSource::Crawl(url),
                (None, Some(path)) => DatasetSource::File(PathBuf::from(path)),
                (None, None) => return Err("either --url or --dataset is required".into()),
            };
            let launcher = build_launcher(cli.driver, &config, &cli.browser_script);
            cmd_generate(&config, launcher, source, output_dir.as_deref().map(Path::new)).await?;
        }
    }

    Ok(())
}
