use axum::{
    routing::{get, post},
    Router,
    extract::{Json, State},
    response::IntoResponse,
};
use tower_http::cors::{CorsLayer, Any};
use chrono::Utc;
use tracing::info;

use crate::api::models::{AppointmentsResponse, RefreshResponse, RefreshStatus};
use crate::api::response;
use crate::error::AppError;
use crate::mailer::Mailer;
use crate::monitor::{CycleOutcome, SettingsUpdate};
use crate::scraper::PageSource;
use crate::AppState;

pub fn create_router<S: PageSource, M: Mailer>(app_state: AppState<S, M>) -> Router {
    Router::new()
        .route("/api/appointments", get(appointments_handler::<S, M>))
        .route("/api/refresh", post(refresh_handler::<S, M>))
        .route(
            "/api/settings",
            get(get_settings_handler::<S, M>).put(put_settings_handler::<S, M>),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn appointments_handler<S: PageSource, M: Mailer>(
    State(state): State<AppState<S, M>>,
) -> impl IntoResponse {
    let booking_url = &state.config.appointment_url;
    match state.monitor.current_report(Utc::now()).await {
        Some(report) => {
            let message = report
                .rows
                .is_empty()
                .then(|| "No appointments found right now".to_string());
            response::success_with_message(AppointmentsResponse::new(report, booking_url), message)
        }
        None => response::error(AppError::FetchError("No appointment data available yet".to_string())),
    }
}

async fn refresh_handler<S: PageSource, M: Mailer>(
    State(state): State<AppState<S, M>>,
) -> impl IntoResponse {
    info!("Manual refresh requested");
    let booking_url = &state.config.appointment_url;
    let body = match state.monitor.run_cycle(Utc::now(), true).await {
        CycleOutcome::Completed(report) => RefreshResponse {
            status: RefreshStatus::Completed,
            appointments: Some(AppointmentsResponse::new(report, booking_url)),
        },
        CycleOutcome::Skipped => RefreshResponse {
            status: RefreshStatus::Skipped,
            appointments: None,
        },
    };
    response::success(body)
}

async fn get_settings_handler<S: PageSource, M: Mailer>(
    State(state): State<AppState<S, M>>,
) -> impl IntoResponse {
    response::success(state.monitor.settings())
}

async fn put_settings_handler<S: PageSource, M: Mailer>(
    State(state): State<AppState<S, M>>,
    Json(update): Json<SettingsUpdate>,
) -> impl IntoResponse {
    response::success(state.monitor.update_settings(update))
}
