use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json as JsonColumn;
use uuid::Uuid;

use crate::{
    db::models::{Milestone, Offering, Person, Startup, StartupRow, StartupStatus},
    error::{AppError, Result},
    handlers::ws::{ChangeKind, Collection},
    middleware::auth::{AuthUser, MaybeAuthUser},
    routes::{read_image_upload, require_field, require_owner},
    services::filters::{self, StartupFilter},
    AppState,
};

/// Public read routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_startups))
        .route("/industries", get(list_industries))
        .route("/:id", get(get_startup))
}

/// Routes that require a signed-in caller.
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_startup))
        .route("/:id", axum::routing::put(update_startup).delete(delete_startup))
        .route("/:id/logo", post(upload_logo))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStartupRequest {
    pub name: String,
    pub tagline: String,
    pub industry: String,
    pub location: Option<String>,
    pub founding_year: Option<i64>,
    #[serde(default)]
    pub years_in_industry: i64,
    pub problem: String,
    #[serde(default)]
    pub solution: String,
    pub vision: String,
    #[serde(default)]
    pub market_size: String,
    pub contact_email: String,
    pub funding_stage: Option<String>,
    pub status: Option<StartupStatus>,
    #[serde(default)]
    pub founders: Vec<Person>,
    #[serde(default)]
    pub team: Vec<Person>,
    #[serde(default)]
    pub offerings: Vec<Offering>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStartupRequest {
    pub name: Option<String>,
    pub tagline: Option<String>,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub founding_year: Option<i64>,
    pub years_in_industry: Option<i64>,
    pub problem: Option<String>,
    pub solution: Option<String>,
    pub vision: Option<String>,
    pub market_size: Option<String>,
    pub contact_email: Option<String>,
    pub funding_stage: Option<String>,
    pub status: Option<StartupStatus>,
    pub founders: Option<Vec<Person>>,
    pub team: Option<Vec<Person>>,
    pub offerings: Option<Vec<Offering>>,
    pub milestones: Option<Vec<Milestone>>,
}

#[derive(Debug, Serialize)]
pub struct StartupListResponse {
    pub startups: Vec<Startup>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupDetailResponse {
    #[serde(flatten)]
    pub startup: Startup,
    pub is_owner: bool,
}

#[derive(Debug, Serialize)]
pub struct IndustriesResponse {
    pub industries: Vec<String>,
}

fn validate(startup: &Startup) -> Result<()> {
    require_field(&startup.name, "name")?;
    require_field(&startup.tagline, "tagline")?;
    require_field(&startup.industry, "industry")?;
    require_field(&startup.problem, "problem")?;
    require_field(&startup.vision, "vision")?;
    require_field(&startup.contact_email, "contact email")?;

    if !startup.contact_email.contains('@') {
        return Err(AppError::Validation(
            "The email address is not valid. Please enter a valid email.".to_string(),
        ));
    }
    if startup.years_in_industry < 0 {
        return Err(AppError::Validation(
            "Years in industry cannot be negative".to_string(),
        ));
    }
    if startup.founders.iter().all(|f| f.name.trim().is_empty()) {
        return Err(AppError::Validation(
            "Please fill out the \"founder name\" field.".to_string(),
        ));
    }
    Ok(())
}

async fn fetch_startups(pool: &sqlx::SqlitePool) -> Result<Vec<Startup>> {
    let rows = sqlx::query_as::<_, StartupRow>("SELECT * FROM startups ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Startup::from).collect())
}

async fn fetch_startup(pool: &sqlx::SqlitePool, id: &str) -> Result<Startup> {
    sqlx::query_as::<_, StartupRow>("SELECT * FROM startups WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(Startup::from)
        .ok_or_else(|| AppError::NotFound("Startup not found".to_string()))
}

async fn save_startup(pool: &sqlx::SqlitePool, s: &Startup) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO startups (
            id, user_id, name, logo_url, tagline, industry, location, founding_year,
            years_in_industry, problem, solution, vision, market_size, contact_email,
            funding_stage, status, founders, team, offerings, milestones, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            logo_url = excluded.logo_url,
            tagline = excluded.tagline,
            industry = excluded.industry,
            location = excluded.location,
            founding_year = excluded.founding_year,
            years_in_industry = excluded.years_in_industry,
            problem = excluded.problem,
            solution = excluded.solution,
            vision = excluded.vision,
            market_size = excluded.market_size,
            contact_email = excluded.contact_email,
            funding_stage = excluded.funding_stage,
            status = excluded.status,
            founders = excluded.founders,
            team = excluded.team,
            offerings = excluded.offerings,
            milestones = excluded.milestones,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&s.id)
    .bind(&s.user_id)
    .bind(&s.name)
    .bind(&s.logo_url)
    .bind(&s.tagline)
    .bind(&s.industry)
    .bind(&s.location)
    .bind(s.founding_year)
    .bind(s.years_in_industry)
    .bind(&s.problem)
    .bind(&s.solution)
    .bind(&s.vision)
    .bind(&s.market_size)
    .bind(&s.contact_email)
    .bind(&s.funding_stage)
    .bind(s.status)
    .bind(JsonColumn(&s.founders))
    .bind(JsonColumn(&s.team))
    .bind(JsonColumn(&s.offerings))
    .bind(JsonColumn(&s.milestones))
    .bind(&s.created_at)
    .bind(&s.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Gives founders and team members without an id a fresh one.
fn assign_ids(people: &mut [Person]) {
    for person in people.iter_mut().filter(|p| p.id.is_empty()) {
        person.id = Uuid::new_v4().to_string();
    }
}

async fn list_startups(
    State(state): State<AppState>,
    Query(filter): Query<StartupFilter>,
) -> Result<Json<StartupListResponse>> {
    let startups = filter.apply(fetch_startups(&state.db.pool).await?);
    Ok(Json(StartupListResponse { startups }))
}

async fn list_industries(State(state): State<AppState>) -> Result<Json<IndustriesResponse>> {
    let startups = fetch_startups(&state.db.pool).await?;
    Ok(Json(IndustriesResponse {
        industries: filters::industries(&startups),
    }))
}

async fn get_startup(
    State(state): State<AppState>,
    caller: MaybeAuthUser,
    Path(id): Path<String>,
) -> Result<Json<StartupDetailResponse>> {
    let startup = fetch_startup(&state.db.pool, &id).await?;
    let is_owner = caller.id() == Some(startup.user_id.as_str());
    Ok(Json(StartupDetailResponse { startup, is_owner }))
}

async fn create_startup(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateStartupRequest>,
) -> Result<(StatusCode, Json<Startup>)> {
    let now = Utc::now();
    let timestamp = now.to_rfc3339();

    let mut startup = Startup {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        name: body.name.trim().to_string(),
        logo_url: String::new(),
        tagline: body.tagline.trim().to_string(),
        industry: body.industry.trim().to_string(),
        location: body
            .location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| "Not specified".to_string()),
        founding_year: body.founding_year.unwrap_or_else(|| i64::from(now.year())),
        years_in_industry: body.years_in_industry,
        problem: body.problem,
        solution: body.solution,
        vision: body.vision,
        market_size: body.market_size,
        contact_email: body.contact_email.trim().to_string(),
        funding_stage: body
            .funding_stage
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| "Pre-Seed".to_string()),
        status: body.status.unwrap_or_default(),
        founders: body.founders,
        team: body.team,
        offerings: body.offerings,
        milestones: body.milestones,
        created_at: timestamp.clone(),
        updated_at: timestamp,
    };

    validate(&startup)?;
    assign_ids(&mut startup.founders);
    assign_ids(&mut startup.team);

    save_startup(&state.db.pool, &startup).await?;

    tracing::info!(startup_id = %startup.id, user_id = %user.id, "startup registered");
    state
        .feed
        .publish(Collection::Startups, &startup.id, ChangeKind::Created)
        .await;

    Ok((StatusCode::CREATED, Json(startup)))
}

async fn update_startup(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateStartupRequest>,
) -> Result<Json<Startup>> {
    let mut startup = fetch_startup(&state.db.pool, &id).await?;
    require_owner(&startup.user_id, &user.id, "edit this startup")?;

    if let Some(v) = body.name {
        startup.name = v.trim().to_string();
    }
    if let Some(v) = body.tagline {
        startup.tagline = v.trim().to_string();
    }
    if let Some(v) = body.industry {
        startup.industry = v.trim().to_string();
    }
    if let Some(v) = body.location {
        startup.location = v;
    }
    if let Some(v) = body.founding_year {
        startup.founding_year = v;
    }
    if let Some(v) = body.years_in_industry {
        startup.years_in_industry = v;
    }
    if let Some(v) = body.problem {
        startup.problem = v;
    }
    if let Some(v) = body.solution {
        startup.solution = v;
    }
    if let Some(v) = body.vision {
        startup.vision = v;
    }
    if let Some(v) = body.market_size {
        startup.market_size = v;
    }
    if let Some(v) = body.contact_email {
        startup.contact_email = v.trim().to_string();
    }
    if let Some(v) = body.funding_stage {
        startup.funding_stage = v;
    }
    if let Some(v) = body.status {
        startup.status = v;
    }
    if let Some(v) = body.founders {
        startup.founders = v;
    }
    if let Some(v) = body.team {
        startup.team = v;
    }
    if let Some(v) = body.offerings {
        startup.offerings = v;
    }
    if let Some(v) = body.milestones {
        startup.milestones = v;
    }

    validate(&startup)?;
    assign_ids(&mut startup.founders);
    assign_ids(&mut startup.team);
    startup.updated_at = Utc::now().to_rfc3339();

    save_startup(&state.db.pool, &startup).await?;

    state
        .feed
        .publish(Collection::Startups, &startup.id, ChangeKind::Updated)
        .await;

    Ok(Json(startup))
}

async fn delete_startup(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let startup = fetch_startup(&state.db.pool, &id).await?;
    require_owner(&startup.user_id, &user.id, "delete this startup")?;

    sqlx::query("DELETE FROM startups WHERE id = ?")
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    if let Err(e) = state.media.remove(&startup.logo_url).await {
        tracing::warn!("failed to remove logo for startup {id}: {e}");
    }

    tracing::info!(startup_id = %id, "startup deleted");
    state
        .feed
        .publish(Collection::Startups, &id, ChangeKind::Deleted)
        .await;

    Ok(StatusCode::NO_CONTENT)
}

async fn upload_logo(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Startup>> {
    let mut startup = fetch_startup(&state.db.pool, &id).await?;
    require_owner(&startup.user_id, &user.id, "edit this startup")?;

    let (file_name, data) = read_image_upload(&mut multipart).await?;
    let url = state
        .media
        .save_image("logos", &startup.id, &file_name, &data)
        .await?;

    let previous = std::mem::replace(&mut startup.logo_url, url);
    startup.updated_at = Utc::now().to_rfc3339();
    save_startup(&state.db.pool, &startup).await?;

    if let Err(e) = state.media.remove(&previous).await {
        tracing::warn!("failed to remove old logo {previous}: {e}");
    }

    state
        .feed
        .publish(Collection::Startups, &startup.id, ChangeKind::Updated)
        .await;

    Ok(Json(startup))
}
