use std::panic::PanicHookInfo;

/// Panic hook that prints roughly the same message as the default panic hook
/// but uses tracing::error instead of stderr.
///
/// Useful when we want panic messages to have the proper log format for the
/// log aggregator.
pub fn tracing_panic_hook(panic: &PanicHookInfo) {
    let thread = std::thread::current();
    let name = thread.name().unwrap_or("<unnamed>");
    let backtrace = std::backtrace::Backtrace::force_capture();
    tracing::error!("thread '{name}' {panic}\nstack backtrace:\n{backtrace}");
}
