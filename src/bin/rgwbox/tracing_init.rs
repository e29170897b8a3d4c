use std::env;
use std::io::IsTerminal;

use tracing_subscriber::fmt::format::FmtSpan;

use rgwbox_rs::config::TracingConfig;

const RUST_LOG: &str = "RUST_LOG";

/// Directives for the `EnvFilter` and whether event targets are printed.
#[derive(Debug, PartialEq)]
struct EventFilter {
    directives: String,
    show_target: bool,
}

/// `--http-tracing` wins over `RUST_LOG`, which wins over the crate-only
/// default. Targets are only shown when foreign crates may log.
fn event_filter(config: &TracingConfig, rust_log: Option<String>) -> EventFilter {
    let level = config.tracing_level;
    let own = format!("rgwbox_rs={level},rgwbox={level}");

    match (config.http_tracing, rust_log) {
        (true, _) => EventFilter {
            directives: format!("{own},reqwest={level},hyper_util={level}"),
            show_target: true,
        },
        (false, Some(rust_log)) => EventFilter {
            directives: rust_log,
            show_target: true,
        },
        (false, None) => EventFilter {
            directives: own,
            show_target: false,
        },
    }
}

pub fn init_tracing(config: &TracingConfig) {
    let filter = event_filter(config, env::var(RUST_LOG).ok());
    let span_events = if config.span_events_tracing {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let ansi = !config.disable_color_tracing && std::io::stdout().is_terminal();

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .compact()
        .with_ansi(ansi)
        .with_span_events(span_events)
        .with_target(filter.show_target)
        .with_env_filter(filter.directives);

    if config.json_tracing {
        builder.json().init();
    } else {
        builder.init();
    }
}
