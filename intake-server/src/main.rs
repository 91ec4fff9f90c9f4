use std::future::ready;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use envconfig::Envconfig;
use health::HealthRegistry;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use intake::clients::build_http_client;
use intake::clients::identity::IdentityClient;
use intake::clients::practice::PracticeDirectoryClient;
use intake::clients::region::RegionDirectoryClient;
use intake::clients::rules::RuleValidatorClient;
use intake::clients::token::TokenClient;
use intake::config::Config;
use intake::dedup::DedupGate;
use intake::enrich::Enricher;
use intake::pipeline::Pipeline;
use intake::redis::RedisClient;
use intake::routing::{Router as OutcomeRouter, Topics};
use intake::sinks::kafka::KafkaSink;
use intake::sinks::RecordSink;
use intake::transport::KafkaTransport;

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy()
            .add_directive("rdkafka=warn".parse().expect("static directive parses")),
    );
    tracing_subscriber::registry().with(log_layer).init();
}

fn setup_metrics_recorder() -> PrometheusHandle {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(EXPONENTIAL_SECONDS)
        .expect("static bucket list is not empty")
        .install_recorder()
        .expect("failed to install metrics recorder")
}

async fn index() -> &'static str {
    "attestation intake"
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    setup_tracing();
    info!("starting attestation intake...");

    let config = Config::init_from_env()?;
    info!(
        brokers = config.kafka.kafka_hosts,
        input_topic = config.kafka.input_topic,
        group_id = config.kafka.kafka_consumer_group,
        workers = config.worker_count,
        "configuration loaded"
    );

    let liveness = HealthRegistry::new("liveness");

    // Status server: probes and the metrics scrape endpoint
    let recorder_handle = setup_metrics_recorder();
    let status_registry = liveness.clone();
    let status_router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route(
            "/_liveness",
            get(move || ready(status_registry.get_status())),
        )
        .route("/metrics", get(move || ready(recorder_handle.render())));
    let bind = config.bind();
    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(bind)
            .await
            .expect("failed to bind status server");
        axum::serve(listener, status_router)
            .await
            .expect("failed to serve status routes");
    });

    // Shutdown signal, checked by every worker at the top of its loop
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
        info!("shutdown signal received");
        _ = shutdown_tx.send(true);
    });

    let redis = Arc::new(RedisClient::new(config.redis_url.clone())?);
    let transport = Arc::new(KafkaTransport::new(&config.kafka)?);
    let producer_liveness = liveness
        .register("kafka_producer".to_string(), time::Duration::seconds(30))
        .await;
    let sink: Arc<dyn RecordSink> =
        Arc::new(KafkaSink::new(&config.kafka, producer_liveness)?);

    let http = build_http_client(config.request_timeout_ms.duration())?;
    let tokens = Arc::new(TokenClient::new(
        http.clone(),
        config.token_url.clone(),
        config.service_username.clone(),
        config.service_password.clone(),
    ));
    let identities = Arc::new(IdentityClient::new(
        http.clone(),
        config.identity_url.clone(),
        tokens.clone(),
        config.caller_id.clone(),
    ));
    let practices = Arc::new(PracticeDirectoryClient::new(
        http.clone(),
        config.practice_directory_url.clone(),
    ));
    let rules = Arc::new(RuleValidatorClient::new(
        http.clone(),
        config.rules_url.clone(),
        config.service_username.clone(),
        config.service_password.clone(),
    ));
    let regions = Arc::new(RegionDirectoryClient::new(
        http,
        config.geography_url.clone(),
        config.office_url.clone(),
        tokens,
        config.caller_id.clone(),
    ));

    let backoff = config.retry_backoff_ms.durations();
    let topics = Topics::from_config(&config.kafka);
    let pipeline = Arc::new(Pipeline::new(
        transport,
        sink.clone(),
        DedupGate::new(redis),
        Enricher::new(identities, practices, backoff.clone()),
        rules,
        OutcomeRouter::new(sink, regions, topics.clone(), backoff),
        topics.dead_letter.clone(),
        config.poll_interval_ms.duration(),
    ));

    let mut workers = Vec::with_capacity(config.worker_count);
    for worker in 0..config.worker_count {
        let handle = liveness
            .register(format!("worker-{worker}"), time::Duration::seconds(60))
            .await;
        workers.push(tokio::spawn(pipeline.clone().run_worker(
            worker,
            handle,
            shutdown_rx.clone(),
        )));
    }
    for worker in workers {
        worker.await?;
    }

    info!("attestation intake shut down");
    Ok(())
}
