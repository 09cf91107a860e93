use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::notification_handlers::*;
use crate::{admin::admin_authorization, middleware::auth_middleware, state::AppState};

/// Operator surface, mounted at `/api/admin/notifications`.
pub fn notification_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications).post(create_notification))
        .route("/stats", get(notification_stats))
        .route("/exhausted", get(exhausted_notifications))
        .route("/retry", post(retry_notifications))
        .route("/purge", post(purge_notifications))
        .route("/:id", get(get_notification))
        .route("/:id/cancel", post(cancel_notification))
        .route("/:id/dispatch", post(dispatch_notification))
        .route_layer(middleware::from_fn(admin_authorization))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
