//! PITCH Book - feed replay
//!
//! Reads a captured BATS PITCH feed from a file or stdin, rebuilds every book,
//! and reports per-symbol top-of-book residency.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::time::Instant;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*};

use pitch_book::{
    analyze, Config, FeedStats, FeedTelemetry, MessageReader, OrderBookManager, RunReport,
};

fn main() -> anyhow::Result<()> {
    // Initialize logging; stdout is reserved for messages and the report
    tracing_subscriber::registry()
        .with(fmt::layer().json().with_writer(io::stderr))
        .with(pitch_book::config::log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let config = Config::load()?.with_input_arg(std::env::args().nth(1));
    info!(input = ?config.input, format = ?config.report_format, "Starting PITCH replay");

    let source: Box<dyn Read> = match &config.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin().lock())),
    };

    let report = run(&config, source)?;

    let rendered = report.render(config.report_format)?;
    match &config.report_path {
        Some(path) => std::fs::write(path, &rendered)
            .with_context(|| format!("writing report to {}", path.display()))?,
        None => io::stdout().lock().write_all(&rendered)?,
    }

    Ok(())
}

fn run(config: &Config, source: Box<dyn Read>) -> anyhow::Result<RunReport> {
    let start = Instant::now();
    let telemetry = FeedTelemetry::new()?;
    let mut manager = OrderBookManager::with_depth(config.depth_levels);
    let mut stats = FeedStats::new();
    let mut stdout = BufWriter::new(io::stdout().lock());

    let reader = MessageReader::new(source).with_strict_framing(config.strict_framing);
    for message in reader {
        let message = message.with_context(|| {
            format!("decoding message {}", stats.messages() + 1)
        })?;
        stats.observe(&message);
        telemetry.record_message(&message);
        if config.print_messages {
            writeln!(stdout, "{message}")?;
        }

        let event = manager
            .apply(&message)
            .with_context(|| format!("applying message {}: {message}", stats.messages()))?;
        telemetry.record_event(event);
    }
    stdout.flush()?;
    drop(stdout);

    let elapsed = start.elapsed();
    info!(
        messages = stats.messages(),
        books = manager.symbols().len(),
        orders = manager.registry().len(),
        elapsed_secs = elapsed.as_secs_f64(),
        "Feed replay complete"
    );

    if let Some(path) = &config.metrics_path {
        std::fs::write(path, telemetry.render()?)
            .with_context(|| format!("writing metrics to {}", path.display()))?;
    }

    let mut report = RunReport::new(
        stats.finish(elapsed),
        analyze(manager.registry()),
        manager.snapshots(),
    );
    report.retain_symbols(&config.symbols);
    Ok(report)
}
