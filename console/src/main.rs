use aeris_core::{SharedSpeed, TimerSlot};
use anyhow::Result;
use axum::{routing::get, Json, Router};
use clap::Parser;
use control_dispatch::{ControlDispatcher, DeviceLink, HttpDeviceLink};
use feed_sync::{FeedSynchronizer, HttpFrameSource};
use rotation_sim::RotationLoop;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod routes;

use config::{Args, Settings};
use routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "aeris_console=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_args(args)?;

    // Single writer (control), single reader (rotation)
    let speed = SharedSpeed::new(settings.speed_range, settings.initial_speed_ms);
    tracing::info!(
        min_ms = settings.speed_range.min_ms(),
        max_ms = settings.speed_range.max_ms(),
        initial_ms = speed.load(),
        "Speed range configured"
    );

    let source = HttpFrameSource::new(settings.fetch_timeout, settings.max_frame_bytes)?;
    let mut feed = FeedSynchronizer::new(settings.feed.clone(), source);
    let mut rotation = RotationLoop::new(settings.rotation, speed.clone());

    let link = HttpDeviceLink::new(&settings.commands, settings.command_timeout)?;
    let control = Arc::new(ControlDispatcher::new(link, speed.clone()).with_throttle(settings.throttle()));

    let mut flush = TimerSlot::new("dispatch-flush");
    if !settings.dispatch_min_interval.is_zero() {
        tracing::info!(
            min_interval_ms = settings.dispatch_min_interval.as_millis() as u64,
            "Speed dispatch throttled"
        );
        flush.arm(flush_deferred_speed(control.clone(), settings.dispatch_min_interval));
    }

    feed.start();
    rotation.start();

    let state = AppState {
        feed: feed.subscribe(),
        angle: rotation.subscribe(),
        speed,
        control,
    };

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", routes::api_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(settings.listen).await?;
    tracing::info!("Aeris console listening on {}", listener.local_addr()?);
    tracing::info!("   Feed: {}", settings.feed.base_url);
    tracing::info!("   Commands: {}", settings.commands.base_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    flush.cancel();
    feed.stop();
    rotation.stop();
    tracing::info!("Aeris console stopped");

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "aeris-console",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Sends the latest throttled speed once the dispatch window reopens
async fn flush_deferred_speed<L: DeviceLink>(control: Arc<ControlDispatcher<L>>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Some(outcome) = control.flush_pending().await {
            tracing::debug!(?outcome, "Flushed deferred speed");
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
