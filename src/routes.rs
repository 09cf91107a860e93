use crate::{
    notification::{
        notification_dto::*, notification_handlers, notification_models::*,
        retry_scheduler::RetrySummary, routes::notification_routes,
    },
    state::AppState,
};
use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        notification_handlers::health_check,
        notification_handlers::create_notification,
        notification_handlers::list_notifications,
        notification_handlers::get_notification,
        notification_handlers::cancel_notification,
        notification_handlers::dispatch_notification,
        notification_handlers::retry_notifications,
        notification_handlers::notification_stats,
        notification_handlers::exhausted_notifications,
        notification_handlers::purge_notifications,
    ),
    components(
        schemas(
            CreateNotificationRequest,
            Notification,
            NotificationStatus,
            RecipientType,
            StatusSummary,
            NotificationStatsResponse,
            RetrySummary,
            PurgeResponse,
            HealthResponse,
            ChannelsHealth,
        )
    ),
    tags(
        (name = "health", description = "Service health"),
        (name = "notifications", description = "Notification delivery operations")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            )
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new().nest(
        "/admin/notifications",
        notification_routes(state.clone()),
    );

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(notification_handlers::health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
