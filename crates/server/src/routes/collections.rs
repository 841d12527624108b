use axum::extract::{Query, State};
use axum::response::Html;
use lendboard_core::Collection;

use super::{NoticeQuery, display_time, render_page};
use crate::error::WebError;
use crate::state::AppState;

async fn cached_at(state: &AppState, collection: Collection) -> Result<Option<String>, WebError> {
    Ok(state
        .store
        .last_successful_sync(collection)
        .await?
        .map(|run| display_time(run.finished_at)))
}

/// GET /notes - cached notes.
pub async fn notes(State(state): State<AppState>, Query(query): Query<NoticeQuery>) -> Result<Html<String>, WebError> {
    let notes = state.store.list_notes().await?;
    render_page(
        "notes.html",
        serde_json::json!({
            "notice": query.notice,
            "notes": notes,
            "cached_at": cached_at(&state, Collection::Notes).await?,
        }),
    )
}

/// GET /listings - cached listings.
pub async fn listings(
    State(state): State<AppState>, Query(query): Query<NoticeQuery>,
) -> Result<Html<String>, WebError> {
    let listings = state.store.list_listings().await?;
    render_page(
        "listings.html",
        serde_json::json!({
            "notice": query.notice,
            "listings": listings,
            "cached_at": cached_at(&state, Collection::Listings).await?,
        }),
    )
}
