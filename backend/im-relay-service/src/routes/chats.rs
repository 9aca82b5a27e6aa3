use crate::error::AppError;
use crate::models::message::ChatMessage;
use crate::state::AppState;
use actix_web::{get, web, HttpResponse};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPreview {
    pub conversation_id: String,
    pub unread_count: u64,
    pub last_message: ChatMessage,
}

/// Inbox previews for a user, most recent conversation first.
///
/// **Endpoint**: `GET /api/v1/users/{user_id}/chats`
#[get("/api/v1/users/{user_id}/chats")]
pub async fn list_chats(
    state: web::Data<AppState>,
    user_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let previews: Vec<ChatPreview> = state
        .cache
        .list_entries(&user_id)
        .await?
        .into_iter()
        .map(|(conversation_id, entry)| ChatPreview {
            conversation_id,
            unread_count: entry.unread_count,
            last_message: entry.last_message,
        })
        .collect();

    Ok(HttpResponse::Ok().json(previews))
}
