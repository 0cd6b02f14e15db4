use std::env;
use std::error::Error;
use std::sync::Arc;

use futures::future::FutureExt;
use log::{info, initialize_logger};
use tokio::sync::mpsc;
use warp::Filter;

use beatschain::clock::SystemClock;
use beatschain::config::{get_variable, get_variable_or};
use beatschain::environment::Environment;
use beatschain::identity::{FingerprintIdentity, FixedIdentity, IdentityProvider, UserProfile};
use beatschain::isrc::allocator::IsrcAllocator;
use beatschain::limits::{LogReporter, UsageLimiter};
use beatschain::routes;
use beatschain::store::{FileStore, KvStore};
use beatschain::store::memory::MemoryStore;
use beatschain::urls::Urls;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let main_port: u16 = get_variable("BEATSCHAIN_PORT")
        .parse()
        .expect("parse BEATSCHAIN_PORT as u16");
    let admin_port: u16 = get_variable("BEATSCHAIN_ADMIN_PORT")
        .parse()
        .expect("parse BEATSCHAIN_ADMIN_PORT as u16");

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port);
    let logger = Arc::new(logger);

    let store: Arc<dyn KvStore> = match env::var("BEATSCHAIN_STORAGE_PATH").ok() {
        Some(path) => {
            info!(logger, "Using file storage"; "path" => &path);
            Arc::new(FileStore::new(path, logger.clone()))
        }
        None => {
            info!(logger, "No storage path configured; state is in-memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let identity: Arc<dyn IdentityProvider> = match env::var("BEATSCHAIN_USER_ID").ok() {
        Some(id) => Arc::new(FixedIdentity::new(UserProfile::new(
            id,
            env::var("BEATSCHAIN_USER_EMAIL").ok(),
            env::var("BEATSCHAIN_PREMIUM").map(|v| v == "true").unwrap_or(false),
        ))),
        None => Arc::new(FingerprintIdentity::new(get_variable_or(
            "BEATSCHAIN_FINGERPRINT",
            &format!("{}|{}", env::consts::OS, env::consts::ARCH),
        ))),
    };

    let clock = Arc::new(SystemClock);

    let isrc = Arc::new(IsrcAllocator::new(
        logger.clone(),
        store.clone(),
        identity.clone(),
        clock.clone(),
    ));

    let reporter = Arc::new(LogReporter::new(logger.clone()));
    let usage = Arc::new(UsageLimiter::new(
        logger.clone(),
        store.clone(),
        identity.clone(),
        clock,
        Some(reporter),
    ));

    info!(logger, "Purging stale usage buckets...");
    usage.purge_stale().await;

    let urls = Arc::new(Urls::new(
        get_variable("BEATSCHAIN_BASE_URL"),
        get_variable_or("BEATSCHAIN_ISRC_PATH", "isrc"),
        get_variable_or("BEATSCHAIN_USAGE_PATH", "usage"),
    ));

    let environment = Environment::new(logger.clone(), isrc, usage, urls);

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate = Arc::new(move || {
        let termination_sender = termination_sender.clone();

        async move {
            let termination_sender = termination_sender.clone();
            termination_sender.send(()).await.unwrap();
        }
        .boxed()
    });

    let should_terminate = async move {
        termination_receiver.recv().await;
    }
    .shared();

    let ctrlc = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let signal = tokio::signal::ctrl_c();

        async move {
            let terminate = terminate.clone();

            tokio::select! {
                _ = should_terminate => {},
                _ = signal => {
                    terminate().await;
                }
            }
        }
    };

    let main_server = {
        let should_terminate = should_terminate.clone();

        let logger2 = logger.clone();

        let generate_route = routes::make_generate_route(environment.clone());
        let retrieve_route = routes::make_retrieve_route(environment.clone());
        let validate_route = routes::make_validate_route(environment.clone());
        let mark_used_route = routes::make_mark_used_route(environment.clone());
        let lookup_route = routes::make_lookup_route(environment.clone());
        let stats_route = routes::make_stats_route(environment.clone());
        let range_route = routes::make_range_route(environment.clone());
        let usage_stats_route = routes::make_usage_stats_route(environment.clone());
        let usage_check_route = routes::make_usage_check_route(environment.clone());
        let usage_record_route = routes::make_usage_record_route(environment.clone());

        let routes = generate_route
            .or(retrieve_route)
            .or(validate_route)
            .or(mark_used_route)
            .or(lookup_route)
            .or(stats_route)
            .or(range_route)
            .or(usage_stats_route)
            .or(usage_check_route)
            .or(usage_record_route)
            .recover(move |r| routes::format_rejection(logger2.clone(), r));

        let (_, main_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let admin_server = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let routes = routes::admin::make_healthz_route(environment.clone()).or(
            routes::admin::make_termination_route(environment.clone(), terminate),
        );

        let (_, admin_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], admin_port), async {
                should_terminate.await;
            });

        admin_server
    };

    tokio::join!(ctrlc, main_server, admin_server);

    info!(logger, "Exiting gracefully...");

    Ok(())
}
