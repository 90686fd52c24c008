use clap::Parser;

#[tokio::main]
async fn main() {
    let args = mirror::arguments::Arguments::parse();
    observe::tracing::initialize(&args.log_filter);
    observe::metrics::setup_registry(Some("mirror".into()), None);
    tracing::info!("running mirror with validated arguments:\n{}", args);
    if let Err(err) = mirror::run(args).await {
        tracing::error!(?err, "mirror exited with an error");
        std::process::exit(1);
    }
}
