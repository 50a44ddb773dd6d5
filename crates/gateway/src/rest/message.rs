//! Message REST endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use campus_database::ChatMessage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub company_id: Uuid,
    pub content: String,
    pub attachment: Option<String>,
    pub created_at: String,
    pub read: bool,
}

impl From<ChatMessage> for MessageResponse {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            company_id: message.company_id,
            content: message.content,
            attachment: message.attachment,
            created_at: message.created_at.to_rfc3339(),
            read: message.read,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    #[serde(default)]
    pub content: String,
    pub attachment: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ConversationQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct SearchQuery {
    /// Keyword to look for in message content
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AckResponse {
    pub message: String,
}

/// Create message routes
pub fn create_message_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/messages/send", post(send_message))
        .route("/messages/unread-count", get(unread_count))
        .route("/messages/partners", get(list_partners))
        .route("/messages/search", get(search_messages))
        .route("/messages/inbox", get(inbox))
        .route("/messages/user/:user_id", get(conversation))
        .route("/messages/:message_id/read", post(mark_read))
        .route("/messages/:message_id", delete(delete_message))
}

#[utoipa::path(
    post,
    path = "/messages/send",
    tag = "Messages",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored and pushed to the receiver if online", body = MessageResponse),
        (status = 400, description = "Invalid message"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Message could not be stored")
    )
)]
pub async fn send_message(
    State(state): State<Arc<GatewayState>>,
    AuthUser(session): AuthUser,
    Json(request): Json<SendMessageRequest>,
) -> GatewayResult<(StatusCode, Json<MessageResponse>)> {
    let message = state
        .broker
        .send_message(&session, request.receiver_id, request.content, request.attachment)
        .await?;

    Ok((StatusCode::CREATED, Json(message.into())))
}

#[utoipa::path(
    get,
    path = "/messages/user/{user_id}",
    tag = "Messages",
    params(
        ("user_id" = Uuid, Path, description = "Conversation partner"),
        ConversationQuery
    ),
    responses(
        (status = 200, description = "Conversation with the given user", body = Vec<MessageResponse>),
        (status = 400, description = "Invalid paging"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn conversation(
    State(state): State<Arc<GatewayState>>,
    AuthUser(session): AuthUser,
    Path(user_id): Path<Uuid>,
    Query(params): Query<ConversationQuery>,
) -> GatewayResult<Json<Vec<MessageResponse>>> {
    if params.limit.is_some_and(|limit| limit <= 0) {
        return Err(GatewayError::InvalidRequest("limit must be positive".to_string()));
    }
    let offset = params.offset.unwrap_or(0);
    if offset < 0 {
        return Err(GatewayError::InvalidRequest("offset must not be negative".to_string()));
    }

    let messages = state
        .store()
        .between(session.user_id, user_id, params.limit, offset)
        .await?;

    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/messages/{message_id}/read",
    tag = "Messages",
    params(("message_id" = Uuid, Path, description = "Message to mark as read")),
    responses(
        (status = 200, description = "Message marked as read", body = AckResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Message not found")
    )
)]
pub async fn mark_read(
    State(state): State<Arc<GatewayState>>,
    AuthUser(session): AuthUser,
    Path(message_id): Path<Uuid>,
) -> GatewayResult<Json<AckResponse>> {
    state.broker.mark_as_read(session.user_id, message_id).await?;

    Ok(Json(AckResponse {
        message: "Message marked as read".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/messages/unread-count",
    tag = "Messages",
    responses(
        (status = 200, description = "Unread messages addressed to the caller", body = UnreadCountResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn unread_count(
    State(state): State<Arc<GatewayState>>,
    AuthUser(session): AuthUser,
) -> GatewayResult<Json<UnreadCountResponse>> {
    let unread_count = state.store().unread_count(session.user_id).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

#[utoipa::path(
    get,
    path = "/messages/partners",
    tag = "Messages",
    responses(
        (status = 200, description = "Users the caller has exchanged messages with", body = Vec<Uuid>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_partners(
    State(state): State<Arc<GatewayState>>,
    AuthUser(session): AuthUser,
) -> GatewayResult<Json<Vec<Uuid>>> {
    Ok(Json(state.store().partners(session.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/messages/search",
    tag = "Messages",
    params(SearchQuery),
    responses(
        (status = 200, description = "Caller's messages in their company containing the keyword, newest first", body = Vec<MessageResponse>),
        (status = 400, description = "Missing search query"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn search_messages(
    State(state): State<Arc<GatewayState>>,
    AuthUser(session): AuthUser,
    Query(params): Query<SearchQuery>,
) -> GatewayResult<Json<Vec<MessageResponse>>> {
    let keyword = params.q.trim();
    if keyword.is_empty() {
        return Err(GatewayError::InvalidRequest("missing search query".to_string()));
    }

    let messages = state
        .store()
        .search(session.company_id, session.user_id, keyword)
        .await?;

    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/messages/inbox",
    tag = "Messages",
    responses(
        (status = 200, description = "Messages addressed to the caller, keyed by sender, each list oldest first", body = BTreeMap<String, Vec<MessageResponse>>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn inbox(
    State(state): State<Arc<GatewayState>>,
    AuthUser(session): AuthUser,
) -> GatewayResult<Json<BTreeMap<Uuid, Vec<MessageResponse>>>> {
    let grouped = state.store().inbox(session.user_id).await?;

    Ok(Json(
        grouped
            .into_iter()
            .map(|(sender_id, messages)| (sender_id, messages.into_iter().map(Into::into).collect()))
            .collect(),
    ))
}

#[utoipa::path(
    delete,
    path = "/messages/{message_id}",
    tag = "Messages",
    params(("message_id" = Uuid, Path, description = "Message to delete")),
    responses(
        (status = 200, description = "Message deleted", body = AckResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No such message sent by the caller")
    )
)]
pub async fn delete_message(
    State(state): State<Arc<GatewayState>>,
    AuthUser(session): AuthUser,
    Path(message_id): Path<Uuid>,
) -> GatewayResult<Json<AckResponse>> {
    if !state.store().delete(message_id, session.user_id).await? {
        return Err(GatewayError::NotFound(format!("message {message_id} not found")));
    }

    Ok(Json(AckResponse {
        message: "Message deleted".to_string(),
    }))
}
