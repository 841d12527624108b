use axum::extract::{Query, State};
use axum::response::{Html, Redirect};
use serde::Serialize;

use super::{NoticeQuery, display_time, redirect_with_notice, render_page};
use crate::error::WebError;
use crate::state::AppState;

#[derive(Serialize)]
struct RunView {
    collection: String,
    finished_at: String,
    status: &'static str,
    row_count: Option<i64>,
    duration_ms: i64,
    error: Option<String>,
}

/// GET / - cache counts, last sync per collection, active strategies.
pub async fn dashboard(
    State(state): State<AppState>, Query(query): Query<NoticeQuery>,
) -> Result<Html<String>, WebError> {
    let note_count = state.store.count_notes().await?;
    let listing_count = state.store.count_listings().await?;
    let active_strategies = state.store.count_active_strategies().await?;

    let runs: Vec<RunView> = state
        .store
        .latest_sync_runs()
        .await?
        .into_iter()
        .map(|run| RunView {
            collection: run.collection.to_string(),
            finished_at: display_time(run.finished_at),
            status: run.status.as_str(),
            row_count: run.row_count,
            duration_ms: run.duration_ms(),
            error: run.error,
        })
        .collect();

    render_page(
        "dashboard.html",
        serde_json::json!({
            "notice": query.notice,
            "note_count": note_count,
            "listing_count": listing_count,
            "active_strategies": active_strategies,
            "runs": runs,
            "sync_enabled": state.sync.is_some(),
        }),
    )
}

/// POST /sync - run one sync cycle now.
pub async fn sync_now(State(state): State<AppState>) -> Redirect {
    let Some(sync) = state.sync.as_ref() else {
        return redirect_with_notice("/", "Sync unavailable: API credentials are not configured");
    };

    let report = sync.run_once().await;
    let notice = if report.is_ok() {
        format!("Sync complete. {}", report.summary())
    } else {
        format!("Sync finished with errors. {}", report.summary())
    };
    redirect_with_notice("/", &notice)
}
