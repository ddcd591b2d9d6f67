//! sitegen - dispatch-driven static site builder.

use anyhow::Result;
use clap::Parser;
use sitegen::build::{build_site, standard_builder};
use sitegen::cli::Cli;
use sitegen::config::SiteConfig;
use sitegen::logger::Logger;
use sitegen::watch::watch_and_build;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let logger = Logger::new(cli.verbose);

    let mut config = SiteConfig::load(&cli.config)?;
    config.apply_cli(&cli);
    config.validate(&logger)?;

    logger.log(
        "build",
        format!(
            "{} -> {}",
            config.build.source.display(),
            config.build.destination.display()
        ),
    );

    let env = standard_builder(&config, logger).finalize();

    if cli.watch {
        watch_and_build(env, Duration::from_millis(config.watch.debounce_ms))
    } else {
        build_site(env)
    }
}
