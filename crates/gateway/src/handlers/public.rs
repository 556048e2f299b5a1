//! Unauthenticated reads

use crate::AppState;
use axum::{extract::State, Json};
use chairs_common::{db::LocationSummary, errors::Result, Repository};
use serde::Serialize;

#[derive(Serialize)]
pub struct LocationsResponse {
    pub ok: bool,
    pub locations: Vec<LocationSummary>,
}

/// Location picker for sign-up, ordered by name
pub async fn locations(State(state): State<AppState>) -> Result<Json<LocationsResponse>> {
    let repo = Repository::new(state.db.clone());
    let locations = repo.list_locations().await?;

    Ok(Json(LocationsResponse { ok: true, locations }))
}
