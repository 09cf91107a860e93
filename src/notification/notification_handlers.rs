use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{error::Result, state::AppState};
use super::{
    channels::ChannelKind,
    notification_dto::{
        ChannelsHealth, CreateNotificationRequest, ExhaustedQuery, HealthResponse,
        ListNotificationsQuery, NotificationStatsResponse, PurgeQuery, PurgeResponse, StatsQuery,
    },
    notification_models::Notification,
    retry_scheduler::RetrySummary,
};

/// Service health and enabled delivery channels
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let channels = state.notification_service.enabled_channels();

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        service: env!("CARGO_PKG_NAME").to_string(),
        channels: ChannelsHealth {
            email: channels.contains(&ChannelKind::Email),
            sms: channels.contains(&ChannelKind::Sms),
        },
    })
}

/// Create a notification and, unless told otherwise, attempt delivery
#[utoipa::path(
    post,
    path = "/api/admin/notifications",
    tag = "notifications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification recorded", body = Notification),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_notification(
    State(state): State<AppState>,
    Json(payload): Json<CreateNotificationRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let notification = state.notification_service.create(payload).await?;

    Ok((StatusCode::CREATED, Json(notification)))
}

/// List notifications, newest first
#[utoipa::path(
    get,
    path = "/api/admin/notifications",
    tag = "notifications",
    params(ListNotificationsQuery),
    responses(
        (status = 200, description = "List of notifications", body = Vec<Notification>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<Notification>>> {
    let notifications = state.notification_service.list(query).await?;
    Ok(Json(notifications))
}

/// Get a single notification
#[utoipa::path(
    get,
    path = "/api/admin/notifications/{id}",
    tag = "notifications",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification", body = Notification),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Notification>> {
    let notification = state.notification_service.get(notification_id).await?;
    Ok(Json(notification))
}

/// Cancel a notification that has not been delivered yet
#[utoipa::path(
    post,
    path = "/api/admin/notifications/{id}/cancel",
    tag = "notifications",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification cancelled", body = Notification),
        (status = 404, description = "Notification not found"),
        (status = 409, description = "Notification already sent, cancelled or exhausted")
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Notification>> {
    let notification = state.notification_service.cancel(notification_id).await?;
    Ok(Json(notification))
}

/// Attempt delivery of one notification now
#[utoipa::path(
    post,
    path = "/api/admin/notifications/{id}/dispatch",
    tag = "notifications",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Delivery attempted", body = Notification),
        (status = 404, description = "Notification not found"),
        (status = 409, description = "Notification is not eligible for delivery")
    ),
    security(("bearer_auth" = []))
)]
pub async fn dispatch_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Notification>> {
    let notification = state.notification_service.dispatch_now(notification_id).await?;
    Ok(Json(notification))
}

/// Run a retry sweep outside the regular schedule
#[utoipa::path(
    post,
    path = "/api/admin/notifications/retry",
    tag = "notifications",
    responses(
        (status = 200, description = "Sweep finished", body = RetrySummary),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = []))
)]
pub async fn retry_notifications(State(state): State<AppState>) -> Result<Json<RetrySummary>> {
    let summary = state.notification_service.retry_sweep().await?;
    Ok(Json(summary))
}

/// Notification health rollup grouped by status
#[utoipa::path(
    get,
    path = "/api/admin/notifications/stats",
    tag = "notifications",
    params(StatsQuery),
    responses(
        (status = 200, description = "Rollup", body = NotificationStatsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = []))
)]
pub async fn notification_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<NotificationStatsResponse>> {
    let stats = state.notification_service.stats(query.status).await?;
    Ok(Json(stats))
}

/// Failed notifications whose retries are used up
#[utoipa::path(
    get,
    path = "/api/admin/notifications/exhausted",
    tag = "notifications",
    params(ExhaustedQuery),
    responses(
        (status = 200, description = "Exhausted notifications", body = Vec<Notification>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = []))
)]
pub async fn exhausted_notifications(
    State(state): State<AppState>,
    Query(query): Query<ExhaustedQuery>,
) -> Result<Json<Vec<Notification>>> {
    let notifications = state.notification_service.exhausted(query.limit).await?;
    Ok(Json(notifications))
}

/// Delete old sent and failed notifications
#[utoipa::path(
    post,
    path = "/api/admin/notifications/purge",
    tag = "notifications",
    params(PurgeQuery),
    responses(
        (status = 200, description = "Purge finished", body = PurgeResponse),
        (status = 400, description = "Invalid age"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = []))
)]
pub async fn purge_notifications(
    State(state): State<AppState>,
    Query(query): Query<PurgeQuery>,
) -> Result<Json<PurgeResponse>> {
    let result = state.notification_service.purge(query.older_than_days).await?;
    Ok(Json(result))
}
