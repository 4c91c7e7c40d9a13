use axum::{extract::State, routing::post, Json, Router};

use crate::{
    error::Result,
    services::matcher::{MatchRequest, MatchResult},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(find_matches))
}

async fn find_matches(
    State(state): State<AppState>,
    Json(body): Json<MatchRequest>,
) -> Result<Json<MatchResult>> {
    let result = state.matcher.find_matches(&body).await?;
    Ok(Json(result))
}
