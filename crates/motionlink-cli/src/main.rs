use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use miette::Result;
use motionlink_common::remote::HttpContentSource;
use motionlink_common::telemetry::{self, TelemetryConfig};
use motionlink_common::{
    RemoteConfig, RemotePaginator, RetryPolicy, compile_associations, merge_associations,
};
use motionlink_renderer::{LocalFs, Pipeline};
use tracing::{Level, info};

mod config;

use config::Config;

#[derive(Parser)]
#[command(version, about = "motionlink - render content database rows into files", long_about = None)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = "motionlink.toml")]
    config: PathBuf,

    /// Extra associations as space separated `name=token` pairs
    #[arg(long, env = "MOTIONLINK_VARS")]
    vars: Option<String>,

    /// Console log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<Level>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette();
    // .env must be loaded before clap reads MOTIONLINK_VARS
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut telemetry_config = TelemetryConfig::from_env("motionlink");
    if let Some(level) = cli.log_level {
        telemetry_config = telemetry_config.with_level(level);
    }
    telemetry::init(telemetry_config);

    let config = Config::load(&cli.config)?;
    let associations = merge_associations(
        config.associations.clone(),
        compile_associations(cli.vars.as_deref().unwrap_or_default()),
    );
    let rules = config.template_rules();

    let remote = RemoteConfig::from_env()?;
    let retry = RetryPolicy::from(&remote);
    info!(
        url = %remote.base_url,
        calls_per_second = remote.calls_per_second,
        rules = rules.len(),
        "starting build"
    );

    let paginator = RemotePaginator::new(HttpContentSource::new(remote), retry);
    let pipeline = Pipeline::new(paginator, LocalFs, associations);

    let start = Instant::now();
    let report = pipeline.run(&rules).await?;
    let elapsed = start.elapsed();

    println!(
        "✓ Rendered {} rows into {} files in {:.2}s",
        report.rows,
        report.flush.written,
        elapsed.as_secs_f64()
    );
    if report.media_files > 0 {
        println!("✓ Downloaded {} media files", report.media_files);
    }
    if !report.flush.unresolved.is_empty() {
        println!(
            "⚠ {} page links could not be resolved",
            report.flush.unresolved.len()
        );
    }

    if !report.failures.is_empty() {
        for failure in &report.failures {
            eprintln!("✗ {}: {}", failure.template.display(), failure.error);
        }
        return Err(miette::miette!(
            "{} of {} rules failed",
            report.failures.len(),
            rules.len()
        ));
    }

    Ok(())
}

fn init_miette() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .expect("couldn't set the miette hook");
    miette::set_panic_hook();
}
