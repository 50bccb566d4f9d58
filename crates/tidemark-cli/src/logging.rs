use tidemark_engine::Context;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

/// Build the invocation's [`Context`] with a stderr log sink filtered by
/// `RUST_LOG` (default `info`). Nothing is installed globally.
pub fn context(json: bool) -> Context {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let dispatch = if json {
        Dispatch::new(
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .finish(),
        )
    } else {
        Dispatch::new(
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .with_target(false)
                .finish(),
        )
    };
    Context::new(dispatch)
}
