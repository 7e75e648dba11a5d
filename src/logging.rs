use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Formats events the way device logs look: `MM-DD HH:MM:SS L/<target>: message`
pub struct LogcatFormatter;

impl<S, N> FormatEvent<S, N> for LogcatFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let timestamp = Local::now().format("%m-%d %H:%M:%S");

        write!(
            writer,
            "{} {}/{}: ",
            timestamp,
            level_letter(metadata.level()),
            short_target(metadata.target())
        )?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

fn level_letter(level: &tracing::Level) -> char {
    match *level {
        tracing::Level::TRACE => 'V',
        tracing::Level::DEBUG => 'D',
        tracing::Level::INFO => 'I',
        tracing::Level::WARN => 'W',
        tracing::Level::ERROR => 'E',
    }
}

// tradefed_report::report::email -> email
fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

/// Install the global subscriber. `RUST_LOG` overrides the level chosen here.
pub fn init(verbose: bool) {
    let filter = if verbose {
        "tradefed_report=debug,warn"
    } else {
        "tradefed_report=info,warn"
    };

    let result = tracing_subscriber::fmt()
        .event_format(LogcatFormatter)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .try_init();
    if result.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}
