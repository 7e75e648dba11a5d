// Main entry point for tradefed-report

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use tradefed_report::cli::{Cli, Commands, ReplayArgs};
use tradefed_report::config::Config;
use tradefed_report::logging;
use tradefed_report::replay::{read_events_from_file, replay};
use tradefed_report::report::{
    CollectingListener, ConsoleResultReporter, EmailResultReporter, FileSystemLogSaver,
    JsonResultReporter, JunitResultReporter, LogSaverResultForwarder, OutboxMailer,
    ResultForwarder, StreamingJsonReporter, TestInvocationListener,
};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    // Load configuration from file (if exists)
    let config = Config::load().unwrap_or_default();

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Replay(args) => run_replay(&args, &config),
    }
}

fn run_replay(args: &ReplayArgs, config: &Config) -> Result<ExitCode> {
    let aggregate = args.aggregate_metrics || config.collector.aggregate_metrics;
    let collector = Arc::new(CollectingListener::new().with_aggregate_metrics(aggregate));
    let mut listeners: Vec<Arc<dyn TestInvocationListener>> = vec![collector.clone()];

    if args.stream {
        listeners.push(Arc::new(StreamingJsonReporter::new()));
    }
    if !args.quiet && !args.stream {
        listeners.push(Arc::new(
            ConsoleResultReporter::new().with_aggregate_metrics(aggregate),
        ));
    }
    if let Some(path) = &args.json {
        listeners.push(Arc::new(
            JsonResultReporter::new(path).with_aggregate_metrics(aggregate),
        ));
    }
    if let Some(path) = &args.junit {
        listeners.push(Arc::new(
            JunitResultReporter::new(path).with_aggregate_metrics(aggregate),
        ));
    }
    if let Some(reporter) = email_reporter(args, config)? {
        listeners.push(Arc::new(reporter.with_aggregate_metrics(aggregate)));
    }

    let events = read_events_from_file(&args.file)?;
    info!("replaying {} events from {}", events.len(), args.file.display());

    let log_dir = args.log_dir.clone().or_else(|| config.log_saver.root_dir.clone());
    let forwarder: Box<dyn TestInvocationListener> = match log_dir {
        Some(dir) => Box::new(LogSaverResultForwarder::new(
            FileSystemLogSaver::new(dir),
            listeners,
        )),
        None => Box::new(ResultForwarder::new(listeners)),
    };
    replay(&events, forwarder.as_ref());

    if collector.has_failed_tests() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn email_reporter(args: &ReplayArgs, config: &Config) -> Result<Option<EmailResultReporter>> {
    let mut email = config.email.clone();
    email.destinations.extend(args.email_to.iter().cloned());
    if email.destinations.is_empty() {
        return Ok(None);
    }

    let Some(outbox) = args.outbox.clone().or_else(|| email.outbox.clone()) else {
        bail!("email destinations are set but no outbox was given (use --outbox)");
    };
    let reporter = EmailResultReporter::from_config(&email, Box::new(OutboxMailer::new(outbox)))
        .context("Invalid email configuration")?;
    Ok(Some(reporter))
}
