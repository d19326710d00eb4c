//! REST surface: rooms, canvases and chat history.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sketchroom_core::room::{Participant, RoomSettings};
use sketchroom_core::{
    Canvas, ChatMessage, CreateRoomOptions, JoinRequest, ReactionAction, Reactions, Room,
    RoomUpdate, RoomView, Shape, ShapeDraft,
};

use crate::error::{ApiError, ApiResult};
use crate::identity::{Identity, MaybeIdentity};
use crate::state::AppState;

/// Messages returned when `limit` is not given.
pub const DEFAULT_MESSAGE_LIMIT: usize = 50;
/// Largest `limit` honoured by the messages endpoint.
pub const MAX_MESSAGE_LIMIT: usize = 100;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/join", post(join_room))
        .route(
            "/api/rooms/{room_id}",
            get(get_room).put(update_room).delete(end_room),
        )
        .route("/api/canvases/{room_id}", get(get_canvas))
        .route("/api/canvases/{room_id}/shapes", post(add_shape))
        .route("/api/chat/{room_id}/messages", get(list_messages))
        .route(
            "/api/chat/messages/{message_id}/reactions",
            post(react_to_message),
        )
}

/// A room as returned to clients, with its link.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    #[serde(flatten)]
    pub room: RoomView,
    pub shareable_link: String,
}

impl RoomResponse {
    fn new(state: &AppState, room: &Room) -> Self {
        Self {
            room: room.view(),
            shareable_link: state.config.shareable_link(&room.room_id),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomBody {
    pub name: String,
    #[serde(flatten)]
    pub options: CreateRoomOptions,
}

async fn create_room(
    State(state): State<AppState>,
    Identity(actor): Identity,
    Json(body): Json<CreateRoomBody>,
) -> ApiResult<(StatusCode, Json<RoomResponse>)> {
    let room = state
        .router
        .registry()
        .create_room(&body.name, &actor, body.options)
        .await?;
    Ok((StatusCode::CREATED, Json(RoomResponse::new(&state, &room))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinBody {
    pub room_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub room_id: String,
    pub name: String,
    pub description: String,
    pub participants: Vec<Participant>,
    pub settings: RoomSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas_id: Option<String>,
}

async fn join_room(
    State(state): State<AppState>,
    MaybeIdentity(actor): MaybeIdentity,
    Json(body): Json<JoinBody>,
) -> ApiResult<Json<JoinResponse>> {
    let display_name = body
        .name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| actor.as_ref().map(|a| a.name.clone()))
        .ok_or_else(|| ApiError::BadRequest("name is required for guests".to_string()))?;

    let mut request = JoinRequest::new(body.room_id.trim(), display_name);
    if let Some(actor) = &actor {
        request = request.with_user(actor.user_id.clone());
    }
    if let Some(password) = body.password {
        request = request.with_password(password);
    }

    // A guest's seat belongs to its socket, so the REST join only admits.
    let registry = state.router.registry();
    let room = if request.user_id.is_some() {
        registry.join_room(&request).await?
    } else {
        registry.check_admission(&request).await?
    };
    let canvas_id = registry
        .store()
        .get_canvas(&room.room_id)
        .await
        .map_err(sketchroom_core::CoreError::from)?
        .map(|canvas| canvas.canvas_id);

    let view = room.view();
    Ok(Json(JoinResponse {
        room_id: view.room_id,
        name: view.name,
        description: view.description,
        participants: view.participants,
        settings: view.settings,
        canvas_id,
    }))
}

async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> ApiResult<Json<RoomResponse>> {
    let room = state.router.registry().get_room(&room_id).await?;
    Ok(Json(RoomResponse::new(&state, &room)))
}

async fn update_room(
    State(state): State<AppState>,
    Identity(actor): Identity,
    Path(room_id): Path<String>,
    Json(update): Json<RoomUpdate>,
) -> ApiResult<Json<RoomResponse>> {
    let room = state
        .router
        .registry()
        .update_room(&room_id, &actor.user_id, update)
        .await?;
    Ok(Json(RoomResponse::new(&state, &room)))
}

async fn end_room(
    State(state): State<AppState>,
    Identity(actor): Identity,
    Path(room_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state
        .router
        .registry()
        .end_room(&room_id, &actor.user_id)
        .await?;
    Ok(Json(json!({ "message": "Room ended" })))
}

async fn get_canvas(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> ApiResult<Json<Canvas>> {
    Ok(Json(state.router.canvas(&room_id).await?))
}

#[derive(Debug, Serialize)]
pub struct ShapeCreated {
    pub shape: Shape,
    pub version: u64,
}

async fn add_shape(
    State(state): State<AppState>,
    Identity(actor): Identity,
    Path(room_id): Path<String>,
    Json(draft): Json<ShapeDraft>,
) -> ApiResult<(StatusCode, Json<ShapeCreated>)> {
    let (shape, version) = state.router.add_shape_as(&actor, &room_id, draft).await?;
    Ok((StatusCode::CREATED, Json(ShapeCreated { shape, version })))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<usize>,
}

/// Clamp a requested page size into `1..=MAX_MESSAGE_LIMIT`.
fn message_limit(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_MESSAGE_LIMIT)
        .clamp(1, MAX_MESSAGE_LIMIT)
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<ChatMessage>,
}

async fn list_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Json<MessagesResponse>> {
    let messages = state
        .router
        .recent_messages(&room_id, message_limit(query.limit))
        .await?;
    Ok(Json(MessagesResponse { messages }))
}

#[derive(Debug, Deserialize)]
pub struct ReactionBody {
    pub emoji: String,
    #[serde(default = "default_action")]
    pub action: ReactionAction,
}

fn default_action() -> ReactionAction {
    ReactionAction::Add
}

#[derive(Debug, Serialize)]
pub struct ReactionsResponse {
    pub reactions: Reactions,
}

async fn react_to_message(
    State(state): State<AppState>,
    Identity(actor): Identity,
    Path(message_id): Path<String>,
    Json(body): Json<ReactionBody>,
) -> ApiResult<Json<ReactionsResponse>> {
    let reactions = state
        .router
        .react_as(&actor.user_id, &message_id, &body.emoji, body.action)
        .await?;
    Ok(Json(ReactionsResponse { reactions }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_limit_is_clamped() {
        assert_eq!(message_limit(None), 50);
        assert_eq!(message_limit(Some(10)), 10);
        assert_eq!(message_limit(Some(0)), 1);
        assert_eq!(message_limit(Some(1000)), 100);
    }
}
