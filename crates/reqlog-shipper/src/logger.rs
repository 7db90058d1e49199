// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Diagnostic log formatting and subscriber setup.
//!
//! Every line is prefixed with `REQLOG` so the shipper's own diagnostics can
//! be told apart from the host application's output:
//!
//! ```text
//! REQLOG | LEVEL | [span_name{span_fields}:] message {event_fields}
//! ```
//!
//! Libraries embedding the shipper usually install their own subscriber and
//! only need [`Formatter`]; [`init`] is for standalone binaries.

use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::ShipperError;

/// Formats events as `REQLOG | LEVEL | spans: message fields`.
///
/// The span path is rendered root first, each span as `name` or
/// `name{fields}`, separated by `: `.
///
/// # Example Output
///
/// ```text
/// REQLOG | WARN | dispatch{attempt=2}: DISPATCH | Attempt 2/3 failed
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let level = event.metadata().level();
        let path = span_path::<S, N>(ctx);
        if path.is_empty() {
            write!(writer, "REQLOG | {level} | ")?;
        } else {
            write!(writer, "REQLOG | {level} | {path}: ")?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Active spans of the current event, root first.
fn span_path<S, N>(ctx: &FmtContext<'_, S, N>) -> String
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    let Some(scope) = ctx.event_scope() else {
        return String::new();
    };

    scope
        .from_root()
        .map(|span| {
            let ext = span.extensions();
            let rendered = match ext.get::<FormattedFields<N>>() {
                Some(fields) if !fields.is_empty() => format!("{}{{{fields}}}", span.name()),
                _ => span.name().to_string(),
            };
            rendered
        })
        .collect::<Vec<_>>()
        .join(": ")
}

/// Filter directive for `config`, with the noisy HTTP internals silenced.
#[must_use]
pub fn filter_directive(config: &Config) -> String {
    format!(
        "h2=off,hyper=off,rustls=off,{}",
        config.effective_log_level()
    )
}

/// Installs a global subscriber using [`Formatter`] at the configured level.
///
/// Output goes to stderr without ANSI colors, whatever features the final
/// build enables for `tracing-subscriber`.
///
/// # Arguments
///
/// * `config` - Supplies the level through [`Config::effective_log_level`]
///
/// # Returns
///
/// * `Ok(())` - The subscriber is installed
/// * `Err(ShipperError::ConfigInvalid)` - The level does not parse as a filter
/// * `Err(ShipperError::Runtime)` - A global subscriber was already set
pub fn init(config: &Config) -> Result<(), ShipperError> {
    let filter = EnvFilter::try_new(filter_directive(config))
        .map_err(|e| ShipperError::ConfigInvalid(format!("could not parse log level: {e}")))?;

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .event_format(Formatter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ShipperError::Runtime(format!("setting default subscriber failed: {e}")))?;

    tracing::debug!("Logging subsystem enabled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt::Subscriber::builder()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .event_format(Formatter)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_prefix_and_level() {
        let output = capture(|| tracing::info!("QUEUE | Shipper started"));
        assert_eq!(output, "REQLOG | INFO | QUEUE | Shipper started\n");
    }

    #[test]
    fn test_span_context_and_fields() {
        let output = capture(|| {
            let span = tracing::debug_span!("dispatch", attempt = 2);
            let _guard = span.enter();
            tracing::warn!(events = 3, "retrying");
        });
        assert_eq!(output, "REQLOG | WARN | dispatch{attempt=2}: retrying events=3\n");
    }

    #[test]
    fn test_nested_spans_render_root_first() {
        let output = capture(|| {
            let outer = tracing::info_span!("shutdown");
            let _outer = outer.enter();
            let inner = tracing::info_span!("drain", events = 10);
            let _inner = inner.enter();
            tracing::info!("sending");
        });
        assert_eq!(
            output,
            "REQLOG | INFO | shutdown: drain{events=10}: sending\n"
        );
    }

    #[test]
    fn test_filter_directive_follows_debug_flag() {
        let config = Config {
            debug: true,
            ..Default::default()
        };
        assert_eq!(
            filter_directive(&config),
            "h2=off,hyper=off,rustls=off,debug"
        );
        assert_eq!(
            filter_directive(&Config::default()),
            "h2=off,hyper=off,rustls=off,info"
        );
    }
}
