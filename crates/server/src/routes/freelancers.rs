use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::{
    db::models::{StudentProfile, StudentProfileRow},
    error::{AppError, Result},
    routes::profile::load_student_profile,
    services::filters::FreelancerFilter,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_freelancers))
        .route("/:id", get(get_freelancer))
}

#[derive(Debug, Serialize)]
pub struct FreelancerListResponse {
    pub freelancers: Vec<StudentProfile>,
}

async fn list_freelancers(
    State(state): State<AppState>,
    Query(filter): Query<FreelancerFilter>,
) -> Result<Json<FreelancerListResponse>> {
    // Only profiles that opted in to freelancing are public
    let rows = sqlx::query_as::<_, StudentProfileRow>(
        "SELECT * FROM student_profiles WHERE is_freelancing = 1 ORDER BY rating DESC, name ASC",
    )
    .fetch_all(&state.db.pool)
    .await?;

    let freelancers = filter.apply(rows.into_iter().map(StudentProfile::from).collect());

    Ok(Json(FreelancerListResponse { freelancers }))
}

async fn get_freelancer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StudentProfile>> {
    let profile = load_student_profile(&state.db.pool, &id)
        .await?
        .filter(|p| p.is_freelancing)
        .ok_or_else(|| AppError::NotFound("Freelancer not found".to_string()))?;

    Ok(Json(profile))
}
