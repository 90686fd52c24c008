use {
    std::sync::Once,
    time::macros::format_description,
    tracing::level_filters::LevelFilter,
    tracing_subscriber::{EnvFilter, Layer, fmt::time::UtcTime, prelude::*, util::SubscriberInitExt},
};

/// Initializes the tracing setup that is shared between the binaries.
/// `env_filter` has similar syntax to env_logger. It is documented at
/// https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html
pub fn initialize(env_filter: &str) {
    set_tracing_subscriber(env_filter);
    std::panic::set_hook(Box::new(crate::panic_hook::tracing_panic_hook));
}

/// Like [`initialize`], but can be called multiple times in a row. Later calls
/// are ignored.
///
/// Useful for tests.
pub fn initialize_reentrant(env_filter: &str) {
    // The tracing subscriber is a global object so initializing it again in the
    // same process by a different thread would fail.
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        set_tracing_subscriber(env_filter);
        std::panic::set_hook(Box::new(crate::panic_hook::tracing_panic_hook));
    });
}

fn set_tracing_subscriber(env_filter: &str) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(UtcTime::new(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        )))
        .with_filter(EnvFilter::new(env_filter));

    tracing_subscriber::registry()
        // Without this the subscriber ignores the next log after a
        // `tracing::event!()` which `sqlx` uses under the hood.
        .with(LevelFilter::TRACE)
        .with(fmt_layer)
        .init();
}
