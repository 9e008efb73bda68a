mod accounts;
mod api;
mod config;
mod credentials;
mod datastore;
mod feed;
mod graph;
mod mail;
mod metrics;
mod session;
mod twoface;

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate guard;

use crate::config::Config;
use crate::datastore::postgres::{self, PostgresStore};
use crate::mail::LogMailer;
use crate::session::Keys;
use actix_web::{
    dev::{Service, ServiceResponse},
    middleware, web, App, HttpServer,
};
use futures::future::{try_join, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<_> = std::env::args().collect();
    guard!(let [_, config_file_path, ..] = &args[..] else {
        eprintln!("First argument should be path to config file");
        return
    });

    let config = match Config::from_file(config_file_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    };

    // Set up logger output. RUST_LOG overrides the default level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber_builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.human_logs {
        subscriber_builder.init();
    } else {
        subscriber_builder.json().init();
    }

    info!("starting microblog");
    if let Err(e) = actix_rt::System::new().block_on(serve(config)) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    // Build the postgres client
    let db = PostgresStore::new(
        postgres::Dsn::new(&config),
        config.db_pool_size,
        Duration::from_secs(config.db_connection_timeout),
    )?;
    prometheus::register(Box::new(db.clone()))?;

    let state = api::State {
        ds: Arc::new(db),
        keys: Arc::new(Keys::new(
            &config.secret_key,
            config.session_ttl_secs,
            config.reset_token_ttl_secs,
        )?),
        mailer: Arc::new(LogMailer),
        mail_sender: config.mail_sender.clone(),
        posts_per_page: config.posts_per_page,
    };

    // Start the userfacing API server
    info!(addr = &config.listen_address[..], "starting API server");
    let max_body_size = config.max_body_size;
    let api_server = HttpServer::new(move || {
        App::new()
            // Middleware for Prometheus
            .wrap_fn(|request, srv| srv.call(request).map(increment_response_metrics))
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(state.clone()))
            // limit size of the payload (global configuration)
            .app_data(api::json_config(max_body_size))
            .configure(api::userfacing::configure::<PostgresStore>)
    })
    .bind(&config.listen_address)?
    .run();

    // Start the metrics server
    info!(addr = &config.metrics_address[..], "starting metrics server");
    let metrics_server = HttpServer::new(|| {
        App::new().service(
            web::scope("/metrics")
                .service(web::resource("/").route(web::get().to(metrics::endpoint::gather)))
                .service(web::resource("").route(web::get().to(metrics::endpoint::gather))),
        )
    })
    .bind(&config.metrics_address)?
    .run();

    try_join(api_server, metrics_server).await?;
    Ok(())
}

/// If response is OK, increment the metrics for HTTP statuses.
fn increment_response_metrics<E, B>(
    response: Result<ServiceResponse<B>, E>,
) -> Result<ServiceResponse<B>, E> {
    match response {
        Ok(response) => {
            metrics::HTTP_RESPONSES
                .with_label_values(&[response.status().as_str()])
                .inc();
            Ok(response)
        }
        other => other,
    }
}
