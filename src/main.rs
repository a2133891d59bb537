use std::sync::Arc;
use chrono::Utc;
use tokio::net::TcpListener;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;
use mvc_appointment_watch::{
    config::Config,
    api::routes::create_router,
    card::CardSelectors,
    mailer::ConfiguredMailer,
    monitor::{Monitor, MonitorOptions, Settings},
    notifier::Notifier,
    scraper::HttpPageSource,
    state::NotificationStore,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mvc_appointment_watch=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = Config::load()?;
    let server_addr = config.server_addr;

    let options = MonitorOptions {
        appointment_url: config.appointment_url.clone(),
        scrape_timeout: config.scrape_timeout,
        cache_ttl: chrono::Duration::from_std(config.refresh_interval)?,
        enable_email: config.enable_email,
        selectors: CardSelectors::default(),
    };
    let settings = Settings {
        cutoff: config.default_cutoff,
        watch: config.watch_list(),
        send_enabled: true,
    };
    let notifier = Notifier::new(
        ConfiguredMailer::from_config(config.mail.clone(), config.mail_dry_run),
        NotificationStore::new(config.state_file.clone()),
    );
    let monitor = Arc::new(Monitor::new(options, settings, HttpPageSource, notifier));

    if !config.enable_email {
        tracing::info!("Email alerts are disabled in configuration (ENABLE_EMAIL=0)");
    }

    // Periodic refresh; a tick that lands while a cycle is running is skipped
    let refresh_interval = config.refresh_interval;
    let background = Arc::clone(&monitor);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            background.scheduled_cycle(Utc::now()).await;
        }
    });

    // Create application state
    let app_state = AppState {
        config: Arc::new(config),
        monitor,
    };

    // Build the router with routes
    let app = create_router(app_state);

    // Create the listener
    let listener = TcpListener::bind(server_addr).await?;

    // Start the server
    tracing::info!("Listening on {}", server_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
