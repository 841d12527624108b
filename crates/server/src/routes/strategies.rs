//! Strategy CRUD pages.
//!
//! Invalid submissions re-render the form with HTTP 422 and the problem, keeping
//! whatever the user typed.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::Form;
use lendboard_core::{Error, NewStrategy};
use serde::Serialize;

use super::{NoticeQuery, display_time, redirect_with_notice, render_page};
use crate::error::WebError;
use crate::forms::{StrategyForm, describe_filters, rating_choices, term_choices};
use crate::state::AppState;

#[derive(Serialize)]
struct StrategyRow {
    id: i64,
    name: String,
    target_amount: i64,
    active: bool,
    updated_at: String,
}

/// Where a form posts back to.
#[derive(Clone, Copy)]
enum FormTarget {
    Create,
    Edit(i64),
}

impl FormTarget {
    fn heading(self) -> &'static str {
        match self {
            FormTarget::Create => "New strategy",
            FormTarget::Edit(_) => "Edit strategy",
        }
    }

    fn action(self) -> String {
        match self {
            FormTarget::Create => "/strategies".into(),
            FormTarget::Edit(id) => format!("/strategies/{id}"),
        }
    }

    fn cancel(self) -> String {
        match self {
            FormTarget::Create => "/strategies".into(),
            FormTarget::Edit(id) => format!("/strategies/{id}"),
        }
    }
}

fn render_form(form: &StrategyForm, target: FormTarget, error: Option<&str>, status: StatusCode) -> Response {
    let page = render_page(
        "strategy_form.html",
        serde_json::json!({
            "heading": target.heading(),
            "action": target.action(),
            "cancel": target.cancel(),
            "error": error,
            "form": form,
            "ranges": form.range_rows(),
            "ratings": rating_choices(),
            "terms": term_choices(),
        }),
    );
    match page {
        Ok(html) => (status, html).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Parse the form, then hand the result to `save`. Syntax and validation
/// errors come back as a re-rendered form.
async fn submit<F, Fut>(form: StrategyForm, target: FormTarget, save: F) -> Result<Response, WebError>
where
    F: FnOnce(NewStrategy) -> Fut,
    Fut: Future<Output = Result<lendboard_core::Strategy, Error>>,
{
    let new = match form.to_new_strategy() {
        Ok(new) => new,
        Err(msg) => return Ok(render_form(&form, target, Some(&msg), StatusCode::UNPROCESSABLE_ENTITY)),
    };

    match save(new).await {
        Ok(strategy) => {
            let verb = if matches!(target, FormTarget::Create) { "Created" } else { "Saved" };
            let notice = format!("{verb} strategy \"{}\"", strategy.name);
            Ok(redirect_with_notice(&format!("/strategies/{}", strategy.id), &notice).into_response())
        }
        Err(Error::InvalidInput(msg)) => Ok(render_form(&form, target, Some(&msg), StatusCode::UNPROCESSABLE_ENTITY)),
        Err(e) => Err(e.into()),
    }
}

/// Strategy id from the path. A non-numeric id names no strategy.
fn strategy_id(raw: &str) -> Result<i64, WebError> {
    raw.parse().map_err(|_| WebError::NotFound(format!("strategy {raw}")))
}

/// GET /strategies
pub async fn index(State(state): State<AppState>, Query(query): Query<NoticeQuery>) -> Result<Html<String>, WebError> {
    let strategies: Vec<StrategyRow> = state
        .store
        .list_strategies()
        .await?
        .into_iter()
        .map(|s| StrategyRow {
            id: s.id,
            name: s.name,
            target_amount: s.target_amount,
            active: s.active,
            updated_at: display_time(s.updated_at),
        })
        .collect();

    render_page("strategies.html", serde_json::json!({ "notice": query.notice, "strategies": strategies }))
}

/// GET /strategies/new
pub async fn new_form() -> Response {
    render_form(&StrategyForm::blank(), FormTarget::Create, None, StatusCode::OK)
}

/// POST /strategies
pub async fn create(State(state): State<AppState>, Form(form): Form<StrategyForm>) -> Result<Response, WebError> {
    submit(form, FormTarget::Create, |new| async move { state.store.create_strategy(new).await }).await
}

/// GET /strategies/{id} - detail plus the cached listings its filters match.
pub async fn show(
    State(state): State<AppState>, Path(id): Path<String>, Query(query): Query<NoticeQuery>,
) -> Result<Html<String>, WebError> {
    let id = strategy_id(&id)?;
    let strategy = state.store.get_strategy(id).await?;
    let listings = state.store.list_listings().await?;
    let total_listings = listings.len();
    let matching: Vec<_> = listings
        .into_iter()
        .filter(|l| strategy.filters.matches(&l.payload))
        .collect();

    render_page(
        "strategy_detail.html",
        serde_json::json!({
            "notice": query.notice,
            "criteria": describe_filters(&strategy.filters),
            "strategy": strategy,
            "listings": matching,
            "total_listings": total_listings,
        }),
    )
}

/// GET /strategies/{id}/edit
pub async fn edit_form(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, WebError> {
    let id = strategy_id(&id)?;
    let strategy = state.store.get_strategy(id).await?;
    Ok(render_form(&StrategyForm::from(&strategy), FormTarget::Edit(id), None, StatusCode::OK))
}

/// POST /strategies/{id}
pub async fn update(
    State(state): State<AppState>, Path(id): Path<String>, Form(form): Form<StrategyForm>,
) -> Result<Response, WebError> {
    let id = strategy_id(&id)?;
    // 404 before validation so a stale form never looks like a validation problem
    state.store.get_strategy(id).await?;
    submit(form, FormTarget::Edit(id), |new| async move { state.store.update_strategy(id, new).await }).await
}

/// POST /strategies/{id}/toggle
pub async fn toggle(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, WebError> {
    let id = strategy_id(&id)?;
    let current = state.store.get_strategy(id).await?;
    let updated = state.store.set_strategy_active(id, !current.active).await?;
    let notice = format!(
        "Strategy \"{}\" is now {}",
        updated.name,
        if updated.active { "active" } else { "inactive" }
    );
    Ok(redirect_with_notice("/strategies", &notice).into_response())
}

/// POST /strategies/{id}/delete
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, WebError> {
    let id = strategy_id(&id)?;
    let strategy = state.store.get_strategy(id).await?;
    state.store.delete_strategy(id).await?;
    Ok(redirect_with_notice("/strategies", &format!("Deleted strategy \"{}\"", strategy.name)).into_response())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::Utc;
    use lendboard_core::{CachedListing, NewStrategy, Range};
    use serde_json::json;

    use crate::routes::test_support::{get, post_form, send, state};

    #[tokio::test]
    async fn test_new_form_renders_choices() {
        let (status, _, body) = send(state().await, get("/strategies/new")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"value="HR""#));
        assert!(body.contains(r#"name="fico_score_min""#));
        assert!(body.contains(r#"value="25""#));
    }

    #[tokio::test]
    async fn test_create_redirects_to_detail() {
        let state = state().await;
        let body = "name=Prime&target_amount=50&active=on&ratings=AA&ratings=A&terms=36&fico_score_min=720\
                    &borrower_rate_max=12.5";
        let (status, location, _) = send(state.clone(), post_form("/strategies", body)).await;

        assert_eq!(status, StatusCode::SEE_OTHER);
        let location = location.unwrap();
        assert!(location.starts_with("/strategies/1?notice=Created"));

        let saved = state.store.get_strategy(1).await.unwrap();
        assert_eq!(saved.name, "Prime");
        assert_eq!(saved.target_amount, 50);
        assert!(saved.active);
        assert_eq!(saved.filters.ratings, vec!["AA".to_string(), "A".to_string()]);
        assert_eq!(saved.filters.terms, vec![36]);
        assert_eq!(saved.filters.fico_score, Range::new(Some(720), None));
        assert_eq!(saved.filters.borrower_rate.max, Some(0.125));
    }

    #[tokio::test]
    async fn test_create_unparsable_number_rerenders() {
        let state = state().await;
        let (status, _, body) =
            send(state.clone(), post_form("/strategies", "name=Bad&fico_score_min=seven+hundred")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("FICO score"));
        assert!(body.contains(r#"value="seven hundred""#));
        assert!(state.store.list_strategies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_validation_failure_rerenders() {
        let state = state().await;
        let (status, _, body) =
            send(state.clone(), post_form("/strategies", "name=Tiny&target_amount=10")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("target amount must be at least"));
        assert!(state.store.list_strategies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inverted_range_rejected() {
        let state = state().await;
        let (status, _, _) =
            send(state, post_form("/strategies", "name=Odd&fico_score_min=800&fico_score_max=700")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_index_lists_strategies() {
        let state = state().await;
        state.store.create_strategy(NewStrategy::named("Alpha")).await.unwrap();
        state.store.create_strategy(NewStrategy::named("Beta")).await.unwrap();

        let (status, _, body) = send(state, get("/strategies")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Alpha"));
        assert!(body.contains("Beta"));
    }

    #[tokio::test]
    async fn test_detail_previews_matches() {
        let state = state().await;
        let mut new = NewStrategy::named("A only");
        new.filters.ratings = vec!["A".into()];
        let strategy = state.store.create_strategy(new).await.unwrap();

        let rows = [(501, "A"), (502, "C"), (503, "A")]
            .into_iter()
            .map(|(n, r)| {
                CachedListing::from_payload(json!({"listing_number": n, "prosper_rating": r}), Utc::now()).unwrap()
            })
            .collect();
        state.store.replace_listings(rows).await.unwrap();

        let (status, _, body) = send(state, get(&format!("/strategies/{}", strategy.id))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Rating: A"));
        assert!(body.contains("(2 of 3)"));
        assert!(body.contains("501"));
        assert!(body.contains("503"));
        assert!(!body.contains("<td>502</td>"));
    }

    #[tokio::test]
    async fn test_missing_strategy_is_404() {
        let state = state().await;
        let (status, _, body) = send(state.clone(), get("/strategies/42")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("strategy 42"));

        let (status, _, _) = send(state.clone(), get("/strategies/42/edit")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = send(state, post_form("/strategies/42", "name=x")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_non_numeric_id_renders_not_found_page() {
        let state = state().await;
        let (status, _, body) = send(state.clone(), get("/strategies/abc")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("<h1>404"));
        assert!(body.contains("strategy abc"));

        let (status, _, body) = send(state.clone(), get("/strategies/abc/edit")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("<h1>404"));

        let (status, _, _) = send(state, post_form("/strategies/abc/toggle", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_edit_prefills_and_update_saves() {
        let state = state().await;
        let mut new = NewStrategy::named("Before");
        new.filters.borrower_rate = Range::new(Some(0.075), None);
        let strategy = state.store.create_strategy(new).await.unwrap();

        let (status, _, body) = send(state.clone(), get(&format!("/strategies/{}/edit", strategy.id))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"value="Before""#));
        assert!(body.contains(r#"name="borrower_rate_min" value="7.5""#));

        let (status, location, _) = send(
            state.clone(),
            post_form(&format!("/strategies/{}", strategy.id), "name=After&target_amount=30"),
        )
        .await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert!(location.unwrap().contains("Saved"));

        let saved = state.store.get_strategy(strategy.id).await.unwrap();
        assert_eq!(saved.name, "After");
        assert_eq!(saved.target_amount, 30);
        assert!(saved.filters.is_empty());
        assert_eq!(saved.created_at, strategy.created_at);
    }

    #[tokio::test]
    async fn test_toggle_and_delete() {
        let state = state().await;
        let strategy = state.store.create_strategy(NewStrategy::named("Flip")).await.unwrap();
        let uri = format!("/strategies/{}/toggle", strategy.id);

        let (status, location, _) = send(state.clone(), post_form(&uri, "")).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert!(location.unwrap().contains("active"));
        assert!(state.store.get_strategy(strategy.id).await.unwrap().active);

        send(state.clone(), post_form(&uri, "")).await;
        assert!(!state.store.get_strategy(strategy.id).await.unwrap().active);

        let (status, _, _) = send(state.clone(), post_form(&format!("/strategies/{}/delete", strategy.id), "")).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert!(state.store.list_strategies().await.unwrap().is_empty());

        let (status, _, _) = send(state, post_form(&format!("/strategies/{}/delete", strategy.id), "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
