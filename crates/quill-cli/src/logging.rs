use std::io::{self, Write};

use nu_ansi_term::Color::{Blue, Magenta, Red, Yellow};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{
        self,
        format::{FmtSpan, Writer},
        FmtContext, FormatEvent, FormatFields, MakeWriter,
    },
    registry::LookupSpan,
};

use crate::{cli::Args, utils::Colored};

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

pub struct CustomFormatter;

impl<S, N> FormatEvent<S, N> for CustomFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        match *event.metadata().level() {
            Level::TRACE => write!(writer, "{} ", Colored(Magenta, "[TRACE]")),
            Level::DEBUG => write!(writer, "{} ", Colored(Blue, "[DEBUG]")),
            Level::INFO => write!(writer, ""),
            Level::WARN => write!(writer, "{} ", Colored(Yellow, "[WARN]")),
            Level::ERROR => write!(writer, "{} ", Colored(Red, "[ERROR]")),
        }?;

        if let Some(message) = visitor.message {
            writeln!(writer, "{message}")
        } else {
            writeln!(writer)
        }
    }
}

/// Info goes to stdout, everything else to stderr.
struct StdWriter;

pub enum Output {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(out) => out.write(buf),
            Output::Stderr(err) => err.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(out) => out.flush(),
            Output::Stderr(err) => err.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for StdWriter {
    type Writer = Output;

    fn make_writer(&'a self) -> Self::Writer {
        Output::Stdout(io::stdout())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        if meta.level() == &Level::INFO {
            Output::Stdout(io::stdout())
        } else {
            Output::Stderr(io::stderr())
        }
    }
}

fn filter_level(args: &Args) -> Level {
    if args.quiet {
        Level::ERROR
    } else if args.verbose >= 2 {
        Level::TRACE
    } else if args.verbose == 1 {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Env filter directives; `log_sql` raises the statement compiler to debug.
pub fn filter_directives(args: &Args, log_sql: bool) -> String {
    let level = filter_level(args);
    let mut directives = format!("quill={level},quill_config={level},quill_db={level}");
    if log_sql && !args.quiet && level < Level::DEBUG {
        directives.push_str(",quill_db::query=debug");
    }
    directives
}

pub fn setup_logging(args: &Args, log_sql: bool) {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter_directives(args, log_sql))
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(StdWriter)
        .compact()
        .without_time();

    let subscriber: Box<dyn Subscriber + Send + Sync> = if args.json {
        Box::new(builder.json().flatten_event(true).finish())
    } else {
        Box::new(builder.event_format(CustomFormatter).finish())
    };

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("quill").chain(argv.iter().copied()))
    }

    #[test]
    fn test_filter_levels() {
        assert_eq!(
            filter_directives(&args(&["ddl"]), false),
            "quill=INFO,quill_config=INFO,quill_db=INFO"
        );
        assert_eq!(
            filter_directives(&args(&["-q", "ddl"]), false),
            "quill=ERROR,quill_config=ERROR,quill_db=ERROR"
        );
        assert!(filter_directives(&args(&["-vv", "ddl"]), false).starts_with("quill=TRACE"));
    }

    #[test]
    fn test_log_sql_adds_query_directive() {
        assert!(filter_directives(&args(&["ddl"]), true).ends_with(",quill_db::query=debug"));
        assert!(!filter_directives(&args(&["-v", "ddl"]), true).contains("quill_db::query"));
    }
}
