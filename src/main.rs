use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // In debug builds, default to debug level for our crate.
    // Can be overridden with the RUST_LOG environment variable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            EnvFilter::new("mailtrace=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = mailtrace::run().await {
        tracing::error!("Fatal: {}", e);
        std::process::exit(1);
    }
}
