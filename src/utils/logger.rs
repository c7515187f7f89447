use std::fmt;

use anyhow::{Context, Result};
use chrono::Local;
use nu_ansi_term::Color;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    EnvFilter, Layer,
};

/// Installs the crate's tracing subscriber: a colored console layer plus a
/// plain rolling file layer under `logs/`.
///
/// Console verbosity follows `RUST_LOG` (default `info`). The returned
/// guard flushes the non-blocking file writer and MUST be kept alive by
/// the caller.
pub fn setup_logger() -> Result<WorkerGuard> {
    std::fs::create_dir_all("logs").context("Failed to create logs directory")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "ledger-mux");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(PlainFormatter)
        .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(LevelColorFormatter)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to set global subscriber")?;

    Ok(guard)
}

// --- Formatters ---

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

/// Console formatter: timestamp, level colored by severity, message.
pub struct LevelColorFormatter;

impl<S, N> FormatEvent<S, N> for LevelColorFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%H:%M:%S");
        let level = *event.metadata().level();

        let color = if level == tracing::Level::ERROR {
            Color::LightRed
        } else if level == tracing::Level::WARN {
            Color::Yellow
        } else if level == tracing::Level::INFO {
            Color::LightGreen
        } else {
            Color::DarkGray
        };

        write!(writer, "{} {} ", timestamp, color.paint(level.as_str()))?;

        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);
        writeln!(writer, "{}", visitor.message)
    }
}

/// File formatter: full timestamp, level, message, no ANSI.
pub struct PlainFormatter;

impl<S, N> FormatEvent<S, N> for PlainFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let level = event.metadata().level();

        write!(writer, "{} [{}] ", timestamp, level)?;

        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);
        writeln!(writer, "{}", visitor.message)
    }
}
