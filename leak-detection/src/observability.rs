use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("leak_detection=info".parse().unwrap_or_else(|_| "info".parse().unwrap()));

    // Results go to stdout as NDJSON, so logs must stay on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
