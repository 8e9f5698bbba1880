use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::event::EventFilter;
use crate::models::{Event, Venue};
use crate::state::AppState;
use crate::store::{EventRepo, VenueRepo};
use crate::utils::error::{AppError, Result};
use crate::utils::extract::AppQuery;
use crate::utils::response::success;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResults {
    events: Vec<Event>,
    venues: Vec<Venue>,
}

/// Public events matching the text and filters, plus active venues matching
/// the text. Filters without text only narrow events.
pub async fn search(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SearchQuery>,
) -> Result<Response> {
    let text = query
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());
    let category = query.category.filter(|c| !c.trim().is_empty());
    if text.is_none() && category.is_none() && query.from.is_none() && query.to.is_none() {
        return Err(AppError::ValidationError(
            "Provide a search term or at least one filter".to_string(),
        ));
    }

    let filter = EventFilter {
        category,
        starts_after: query.from,
        starts_before: query.to,
        public_only: true,
        text: text.clone(),
        ..Default::default()
    };
    let events = state.store.list_events(&filter).await?;
    let venues = match &text {
        Some(text) => state.store.search_venues(text).await?,
        None => Vec::new(),
    };
    tracing::debug!(
        term = ?text,
        events = events.len(),
        venues = venues.len(),
        "Search executed"
    );
    Ok(success(SearchResults { events, venues }, "Search results"))
}
