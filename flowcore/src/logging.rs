use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Initialise the process-wide `tracing` subscriber once (§9 "Global
/// mutable state ... pass explicit context through constructors" — this is
/// the one deliberate exception: a process-wide logging sink is ambient
/// infrastructure, not pipeline state, and every other component takes it as
/// a given rather than threading a logger handle through every call site).
///
/// `json` selects the structured formatter used in production deployments;
/// local/dev runs get the human-readable pretty formatter. The filter is
/// read from `RUST_LOG`, defaulting to `info`.
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_span_events(FmtSpan::NONE);
    if json {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}
