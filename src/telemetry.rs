use std::sync::OnceLock;
use tracing::subscriber::set_global_default;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

/// Compose the formatting layer and an env filter into a subscriber.
/// set level via env variable "RUST_LOG"
pub fn get_subscriber<Sink>(env_filter: &str, sink: Sink) -> impl Subscriber + Send + Sync
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(sink)
        .with_target(false);

    tracing_subscriber::registry().with(env_filter).with(fmt_layer)
}

/// Install the subscriber used by the command line tool.
/// Progress goes to stderr so stdout stays free.
pub fn init_tracing() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    set_global_default(get_subscriber("info", std::io::stderr))
}

/// Ensures the test subscriber is only initialised once.
/// Output is discarded unless TEST_LOG=true.
pub fn init_test_tracing() {
    static TRACING: OnceLock<()> = OnceLock::new();
    TRACING.get_or_init(|| {
        // another test binary may already own the global subscriber
        if std::env::var("TEST_LOG").is_ok_and(|x| x.to_lowercase().contains("true")) {
            let _ = set_global_default(get_subscriber("debug", std::io::stdout));
        } else {
            let _ = set_global_default(get_subscriber("debug", std::io::sink));
        }
    });
}
