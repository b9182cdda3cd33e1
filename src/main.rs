use dashgo::{
    config::AppConfig,
    services::{HttpUsersApi, QueryTimings, UserService},
    AppState,
};

use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashgo=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let api = HttpUsersApi::new(&config.api_base_url, config.api_timeout)?;
    tracing::info!("Using users API at {}", api.base_url());

    let user_service = Arc::new(UserService::new(
        Arc::new(api),
        config.users_per_page,
        QueryTimings {
            users_stale_time: config.users_stale_time,
            user_stale_time: config.user_stale_time,
            render_timeout: config.render_timeout,
        },
    ));

    // Periodically drop cache entries nobody has asked for recently
    {
        let user_service = user_service.clone();
        let gc_time = config.cache_gc_time;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(gc_time.max(std::time::Duration::from_secs(1)));
            loop {
                interval.tick().await;
                user_service.collect_garbage(gc_time).await;
            }
        });
    }

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));

    let app_state = AppState {
        user_service,
        config: Arc::new(config),
    };

    let app = dashgo::router(app_state);

    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
