use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as JsonColumn;
use uuid::Uuid;

use crate::{
    db::models::{Hackathon, HackathonMode, HackathonRow, HackathonTeam},
    error::{AppError, Result},
    handlers::ws::{ChangeKind, Collection},
    middleware::auth::{AuthUser, MaybeAuthUser},
    routes::{clean_list, require_field, require_owner, teams},
    services::filters::HackathonFilter,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_hackathons))
        .route("/:id", get(get_hackathon))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_hackathon))
        .route("/:id", put(update_hackathon).delete(delete_hackathon))
        .route("/:id/teams", post(teams::register_team))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHackathonRequest {
    pub title: String,
    pub organizer: String,
    pub date: String,
    pub location: String,
    pub mode: HackathonMode,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    pub prize: String,
    #[serde(default)]
    pub image_url: String,
    pub description: String,
    #[serde(default)]
    pub official_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHackathonRequest {
    pub title: Option<String>,
    pub organizer: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
    pub mode: Option<HackathonMode>,
    pub tech_stack: Option<Vec<String>>,
    pub prize: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub official_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HackathonListResponse {
    pub hackathons: Vec<Hackathon>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HackathonDetailResponse {
    #[serde(flatten)]
    pub hackathon: Hackathon,
    pub teams: Vec<HackathonTeam>,
    pub is_owner: bool,
}

fn validate(h: &Hackathon) -> Result<()> {
    // Every field on the event form is required
    require_field(&h.title, "title")?;
    require_field(&h.organizer, "organizer")?;
    require_field(&h.date, "date")?;
    require_field(&h.location, "location")?;
    require_field(&h.prize, "prize")?;
    require_field(&h.description, "description")?;
    Ok(())
}

pub async fn fetch_hackathon(pool: &sqlx::SqlitePool, id: &str) -> Result<Hackathon> {
    sqlx::query_as::<_, HackathonRow>("SELECT * FROM hackathons WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(Hackathon::from)
        .ok_or_else(|| AppError::NotFound("Hackathon not found".to_string()))
}

async fn save_hackathon(pool: &sqlx::SqlitePool, h: &Hackathon) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO hackathons (
            id, user_id, title, organizer, date, location, mode, tech_stack, prize,
            image_url, description, official_url, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            organizer = excluded.organizer,
            date = excluded.date,
            location = excluded.location,
            mode = excluded.mode,
            tech_stack = excluded.tech_stack,
            prize = excluded.prize,
            image_url = excluded.image_url,
            description = excluded.description,
            official_url = excluded.official_url,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&h.id)
    .bind(&h.user_id)
    .bind(&h.title)
    .bind(&h.organizer)
    .bind(&h.date)
    .bind(&h.location)
    .bind(h.mode)
    .bind(JsonColumn(&h.tech_stack))
    .bind(&h.prize)
    .bind(&h.image_url)
    .bind(&h.description)
    .bind(&h.official_url)
    .bind(&h.created_at)
    .bind(&h.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

async fn list_hackathons(
    State(state): State<AppState>,
    Query(filter): Query<HackathonFilter>,
) -> Result<Json<HackathonListResponse>> {
    let rows = sqlx::query_as::<_, HackathonRow>("SELECT * FROM hackathons")
        .fetch_all(&state.db.pool)
        .await?;

    let hackathons = filter.apply(rows.into_iter().map(Hackathon::from).collect());

    Ok(Json(HackathonListResponse { hackathons }))
}

async fn get_hackathon(
    State(state): State<AppState>,
    caller: MaybeAuthUser,
    Path(id): Path<String>,
) -> Result<Json<HackathonDetailResponse>> {
    let hackathon = fetch_hackathon(&state.db.pool, &id).await?;
    let teams = teams::fetch_teams(&state.db.pool, Some(&id)).await?;
    let is_owner = caller.id() == Some(hackathon.user_id.as_str());

    Ok(Json(HackathonDetailResponse {
        hackathon,
        teams,
        is_owner,
    }))
}

async fn create_hackathon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateHackathonRequest>,
) -> Result<(StatusCode, Json<Hackathon>)> {
    let now = Utc::now().to_rfc3339();

    let hackathon = Hackathon {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        title: body.title.trim().to_string(),
        organizer: body.organizer.trim().to_string(),
        date: body.date.trim().to_string(),
        location: body.location.trim().to_string(),
        mode: body.mode,
        tech_stack: clean_list(body.tech_stack),
        prize: body.prize.trim().to_string(),
        image_url: body.image_url,
        description: body.description,
        official_url: body.official_url.trim().to_string(),
        created_at: now.clone(),
        updated_at: now,
    };

    validate(&hackathon)?;
    save_hackathon(&state.db.pool, &hackathon).await?;

    tracing::info!(hackathon_id = %hackathon.id, user_id = %user.id, "hackathon registered");
    state
        .feed
        .publish(Collection::Hackathons, &hackathon.id, ChangeKind::Created)
        .await;

    Ok((StatusCode::CREATED, Json(hackathon)))
}

async fn update_hackathon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateHackathonRequest>,
) -> Result<Json<Hackathon>> {
    let mut hackathon = fetch_hackathon(&state.db.pool, &id).await?;
    require_owner(&hackathon.user_id, &user.id, "edit this hackathon")?;

    if let Some(v) = body.title {
        hackathon.title = v.trim().to_string();
    }
    if let Some(v) = body.organizer {
        hackathon.organizer = v.trim().to_string();
    }
    if let Some(v) = body.date {
        hackathon.date = v.trim().to_string();
    }
    if let Some(v) = body.location {
        hackathon.location = v.trim().to_string();
    }
    if let Some(v) = body.mode {
        hackathon.mode = v;
    }
    if let Some(v) = body.tech_stack {
        hackathon.tech_stack = clean_list(v);
    }
    if let Some(v) = body.prize {
        hackathon.prize = v.trim().to_string();
    }
    if let Some(v) = body.image_url {
        hackathon.image_url = v;
    }
    if let Some(v) = body.description {
        hackathon.description = v;
    }
    if let Some(v) = body.official_url {
        hackathon.official_url = v.trim().to_string();
    }

    validate(&hackathon)?;
    hackathon.updated_at = Utc::now().to_rfc3339();
    save_hackathon(&state.db.pool, &hackathon).await?;

    state
        .feed
        .publish(Collection::Hackathons, &hackathon.id, ChangeKind::Updated)
        .await;

    Ok(Json(hackathon))
}

async fn delete_hackathon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let hackathon = fetch_hackathon(&state.db.pool, &id).await?;
    require_owner(&hackathon.user_id, &user.id, "delete this hackathon")?;

    let team_ids = sqlx::query_scalar::<_, String>("SELECT id FROM hackathon_teams WHERE hackathon_id = ?")
        .bind(&id)
        .fetch_all(&state.db.pool)
        .await?;

    // Cascades to teams and their members
    sqlx::query("DELETE FROM hackathons WHERE id = ?")
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    tracing::info!(hackathon_id = %id, teams = team_ids.len(), "hackathon deleted");

    for team_id in &team_ids {
        state
            .feed
            .publish(Collection::Teams, team_id, ChangeKind::Deleted)
            .await;
    }
    state
        .feed
        .publish(Collection::Hackathons, &id, ChangeKind::Deleted)
        .await;

    Ok(StatusCode::NO_CONTENT)
}
