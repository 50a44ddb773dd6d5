//! # Campus Gateway Crate
//!
//! HTTP REST and WebSocket surface over the messaging broker.
//!
//! ## Architecture
//!
//! - **REST**: message history, search, inbox, send, read receipts and deletion, with OpenAPI documentation
//! - **WebSocket**: one authenticated socket per broker session at `/ws`
//! - **Auth**: HS256 bearer tokens, from the `Authorization` header or a `token` query parameter
//! - **Middleware**: CORS and request logging
//!
//! ## Usage
//!
//! ```rust,no_run
//! use campus_gateway::{create_router, GatewayState};
//!
//! # async fn run(config: campus_config::AppConfig, pool: sqlx::SqlitePool) -> anyhow::Result<()> {
//! let state = GatewayState::from_config(&config, pool);
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7070").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

pub use auth::{AuthUser, Claims, TokenAuthority};
pub use error::{GatewayError, GatewayResult};
pub use state::GatewayState;

use axum::{middleware as axum_middleware, Router};
use std::sync::Arc;

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let arc_state = Arc::new(state);
    let mut router = Router::new()
        .merge(rest::create_rest_routes().with_state(arc_state.clone()))
        .merge(websocket::create_websocket_routes().with_state(arc_state))
        .layer(middleware::cors_layer())
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    // Add Swagger UI if in debug mode
    #[cfg(debug_assertions)]
    {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        #[derive(OpenApi)]
        #[openapi(
            paths(
                rest::health::health_check,
                rest::message::send_message,
                rest::message::conversation,
                rest::message::mark_read,
                rest::message::unread_count,
                rest::message::list_partners,
                rest::message::search_messages,
                rest::message::inbox,
                rest::message::delete_message,
            ),
            components(
                schemas(
                    rest::health::HealthResponse,
                    rest::message::MessageResponse,
                    rest::message::SendMessageRequest,
                    rest::message::ConversationQuery,
                    rest::message::SearchQuery,
                    rest::message::UnreadCountResponse,
                    rest::message::AckResponse,
                )
            ),
            tags(
                (name = "Health", description = "Service status"),
                (name = "Messages", description = "Direct messages"),
            )
        )]
        struct ApiDoc;

        router = router
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
}
