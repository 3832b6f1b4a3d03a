use tracing_subscriber::EnvFilter;

/// Initializes a `tracing_subscriber` using `IMGPACK_LOG` first, then `RUST_LOG`, then a default.
///
/// Log field contract for imgpack tools:
/// - Every event carries `event = "<name>"` under the `imgpack` target.
/// - Skips always name the offending input (`path`, `line`, or archive/entry/global id).
/// - The run ends with exactly one `import_complete` event.
pub fn init_tracing() {
    let filter = env_filter();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("IMGPACK_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
