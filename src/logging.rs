//! Console logging.
//!
//! Events are written to standard output as `LEVEL: message` lines, the
//! format scripts wrapping the converter already parse. The filter defaults
//! to `info` (`warn` when quiet) and can be overridden through the
//! `COORDCONV_LOG` environment variable using `tracing-subscriber`'s
//! directive syntax.

use std::fmt;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::CoordconvError;

/// Environment variable holding a filter directive.
pub const LOG_ENV: &str = "COORDCONV_LOG";

/// Formats events as `PREFIX: message`.
struct PrefixFormatter;

fn level_prefix(level: &Level) -> &'static str {
    if *level == Level::ERROR {
        "ERROR: "
    } else if *level == Level::WARN {
        "WARN: "
    } else if *level == Level::INFO {
        "INFO: "
    } else if *level == Level::DEBUG {
        "DEBUG: "
    } else {
        "TRACE: "
    }
}

impl<S, N> FormatEvent<S, N> for PrefixFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{}", level_prefix(event.metadata().level()))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn filter_for(quiet: bool, directive: Option<String>) -> Result<EnvFilter, CoordconvError> {
    match directive.filter(|d| !d.trim().is_empty()) {
        Some(directive) => EnvFilter::try_new(&directive).map_err(|e| {
            CoordconvError::Configuration(format!(
                "invalid {} directive '{}': {}",
                LOG_ENV, directive, e
            ))
        }),
        None => Ok(EnvFilter::new(if quiet { "warn" } else { "info" })),
    }
}

/// Installs the global subscriber.
pub fn init(quiet: bool) -> Result<(), CoordconvError> {
    let filter = filter_for(quiet, std::env::var(LOG_ENV).ok())?;
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(PrefixFormatter)
                .with_writer(std::io::stdout),
        )
        .try_init()
        .map_err(|e| CoordconvError::Configuration(format!("failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_match_levels() {
        assert_eq!(level_prefix(&Level::INFO), "INFO: ");
        assert_eq!(level_prefix(&Level::WARN), "WARN: ");
        assert_eq!(level_prefix(&Level::DEBUG), "DEBUG: ");
    }

    #[test]
    fn quiet_defaults_to_warn() {
        let filter = filter_for(true, None).unwrap();
        assert_eq!(filter.to_string(), "warn");
        let filter = filter_for(false, Some("  ".into())).unwrap();
        assert_eq!(filter.to_string(), "info");
    }

    #[test]
    fn bad_directive_is_a_configuration_error() {
        let err = filter_for(false, Some("coordconv=loud".into())).unwrap_err();
        assert!(matches!(err, CoordconvError::Configuration(_)));
    }
}
