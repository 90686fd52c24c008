pub mod api;
pub mod arguments;
pub mod auth;
pub mod index;
pub mod scheduler;
pub mod sync;

use {
    crate::{
        api::AppState,
        arguments::Arguments,
        index::IndexClient,
        scheduler::{
            FULL_SYNC_JOB, Job, PRICE_REFRESH_JOB, RETENTION_CLEANUP_JOB, SETTLEMENT_SYNC_JOB,
            Scheduler,
        },
        sync::SyncEngine,
    },
    alloy::signers::local::PrivateKeySigner,
    anyhow::{Context, Result},
    oracle::{
        CoinGecko, Coinbase, OracleService, PriceRefresher, PriceSource, PriceTarget, SanityBand,
    },
    sqlx::PgPool,
    std::{net::SocketAddr, sync::Arc},
};

pub async fn run(args: Arguments) -> Result<()> {
    let db = PgPool::connect(args.db_url.as_str())
        .await
        .context("connecting to database")?;

    let signer: PrivateKeySigner = args
        .oracle_signer_key
        .parse()
        .context("invalid oracle signer key")?;
    let writer = signer.address();
    let provider = contracts::provider_with_signer(&args.node_url, Box::new(signer));
    let oracle = Arc::new(OracleService::new(
        contracts::PriceOracle::new(args.oracle_address, provider),
        writer,
        SanityBand {
            min: args.price_sanity_min,
            max: args.price_sanity_max,
        },
        args.ledger_deadline,
    ));
    oracle
        .initialize()
        .await
        .context("granting the price writer role")?;

    let client = reqwest::Client::new();
    let index = IndexClient::new(args.index_url, client.clone(), args.index_deadline);
    let engine = Arc::new(SyncEngine::new(Arc::new(index), db.clone()));

    let sources: Vec<Box<dyn PriceSource>> = vec![
        Box::new(CoinGecko::new(
            client.clone(),
            args.coingecko_url,
            args.coingecko_api_key,
            args.coingecko_chain,
            args.coingecko_native_id,
        )),
        Box::new(Coinbase::new(
            client,
            args.coinbase_url,
            args.coinbase_native_symbol,
            args.coinbase_token_symbols.into_iter().collect(),
        )),
    ];
    let refresher = Arc::new(PriceRefresher::new(
        oracle.clone(),
        sources,
        args.price_tolerance_bps,
    ));

    let full_sync = Job::new(FULL_SYNC_JOB, args.full_sync_interval, {
        let engine = engine.clone();
        move || {
            let engine = engine.clone();
            async move { engine.sync_all().await.map(|_| ()) }
        }
    });
    let settlement_sync = Job::new(SETTLEMENT_SYNC_JOB, args.settlement_sync_interval, {
        let engine = engine.clone();
        move || {
            let engine = engine.clone();
            async move { engine.sync_settlements().await.map(|_| ()) }
        }
    });
    let price_targets: Vec<PriceTarget> = std::iter::once(PriceTarget::Native)
        .chain(args.tracked_tokens.iter().copied().map(PriceTarget::Token))
        .collect();
    let price_refresh = Job::new(PRICE_REFRESH_JOB, args.price_refresh_interval, {
        let refresher = refresher.clone();
        move || {
            let refresher = refresher.clone();
            let targets = price_targets.clone();
            async move {
                for target in targets {
                    refresher
                        .fetch_and_push(target)
                        .await
                        .with_context(|| format!("refreshing price for {target}"))?;
                }
                Ok(())
            }
        }
    });
    let retention = chrono::Duration::from_std(args.price_update_retention)
        .context("retention window out of range")?;
    let retention_cleanup = Job::new(RETENTION_CLEANUP_JOB, args.retention_cleanup_interval, {
        let db = db.clone();
        move || {
            let db = db.clone();
            async move {
                let cutoff = chrono::Utc::now() - retention;
                let deleted = database::price_updates::delete_before(&db, cutoff).await?;
                tracing::info!(deleted, "cleaned up aged price updates");
                Ok(())
            }
        }
    });

    let scheduler = Arc::new(Scheduler::new(vec![
        full_sync,
        settlement_sync,
        price_refresh,
        retention_cleanup,
    ]));
    scheduler.spawn_all();
    observe::metrics::serve_metrics(args.metrics_address);

    let state = Arc::new(AppState {
        db,
        engine,
        scheduler,
        oracle,
        rate_limiter: Arc::new(rate_limit::RateLimiter::new(rate_limit::Strategy {
            max_requests: args.rate_limit_max_requests,
            window: args.rate_limit_window,
        })),
        verifier: auth::Verifier::new(&args.api_secret),
    });
    let app = api::handle_all_routes(state).into_make_service_with_connect_info::<SocketAddr>();
    let listener = tokio::net::TcpListener::bind(args.bind_address)
        .await
        .context("binding API address")?;
    tracing::info!(address = %args.bind_address, "serving API");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server exited")
}

#[cfg(unix)]
async fn shutdown_signal() {
    // Intercept signals for graceful shutdown. Kubernetes sends sigterm, Ctrl-C
    // sends sigint.
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .unwrap()
            .recv()
            .await
    };
    let sigint = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .unwrap()
            .recv()
            .await;
    };
    futures::pin_mut!(sigint);
    futures::pin_mut!(sigterm);
    futures::future::select(sigterm, sigint).await;
}

#[cfg(windows)]
async fn shutdown_signal() {
    // No support for signal handling on Windows.
    std::future::pending().await
}
