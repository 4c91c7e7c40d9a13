use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as JsonColumn;
use uuid::Uuid;

use crate::{
    db::models::{
        Hackathon, HackathonTeam, RoleOpening, StudentProfile, TeamMember, TeamMemberRow, TeamRow,
    },
    error::{AppError, Result},
    handlers::ws::{ChangeKind, Collection},
    middleware::auth::{AuthUser, MaybeAuthUser},
    routes::{
        auth::find_user, clean_list, hackathons::fetch_hackathon, profile::load_student_profile,
        require_field, require_owner,
    },
    services::filters::{self, TeamFilter},
    AppState,
};

const LEAD_ROLE: &str = "Team Lead";
const ANY_ROLE: &str = "Any Role";
const MAX_TEAM_SIZE: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_teams))
        .route("/roles", get(list_roles))
        .route("/:id", get(get_team))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/:id", delete(delete_team))
        .route("/:id/join", post(join_team))
        .route("/:id/members/me", delete(leave_team))
}

#[derive(Debug, Deserialize)]
pub struct NewMember {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTeamRequest {
    pub name: String,
    pub description: String,
    #[serde(default = "default_team_size")]
    pub team_size: i64,
    #[serde(default)]
    pub members: Vec<NewMember>,
    #[serde(default)]
    pub looking_for: Vec<RoleOpening>,
}

fn default_team_size() -> i64 {
    4
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinTeamRequest {
    pub role: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TeamListResponse {
    pub teams: Vec<HackathonTeam>,
}

#[derive(Debug, Serialize)]
pub struct RolesResponse {
    pub roles: Vec<String>,
}

/// Team page view: the team, its hackathon, and whether it can take members.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDetailResponse {
    #[serde(flatten)]
    pub team: HackathonTeam,
    pub hackathon: Hackathon,
    pub lead: Option<StudentProfile>,
    pub roles_needed: i64,
    pub is_full: bool,
    pub contact_email: Option<String>,
    pub contact_label: &'static str,
    pub is_member: bool,
    pub is_owner: bool,
}

impl TeamDetailResponse {
    fn build(
        team: HackathonTeam,
        hackathon: Hackathon,
        lead: Option<StudentProfile>,
        caller: Option<&str>,
    ) -> Self {
        let is_full = team.is_full();
        let contact_email = if is_full {
            None
        } else {
            team.lead()
                .and_then(|m| m.email.clone())
                .or_else(|| lead.as_ref().map(|p| p.email.clone()))
                .filter(|e| !e.is_empty())
        };

        let is_member = caller.is_some_and(|id| team.member_ids.iter().any(|m| m == id));
        let is_owner = caller == Some(team.created_by.as_str());

        Self {
            roles_needed: team.roles_needed(),
            is_full,
            contact_email,
            contact_label: if is_full { "Team Full" } else { "Contact Team Lead" },
            is_member,
            is_owner,
            team,
            hackathon,
            lead,
        }
    }
}

/// Loads teams (optionally for one hackathon) with their members attached.
pub async fn fetch_teams(
    pool: &sqlx::SqlitePool,
    hackathon_id: Option<&str>,
) -> Result<Vec<HackathonTeam>> {
    let rows = match hackathon_id {
        Some(hackathon_id) => {
            sqlx::query_as::<_, TeamRow>(
                "SELECT * FROM hackathon_teams WHERE hackathon_id = ? ORDER BY created_at DESC",
            )
            .bind(hackathon_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, TeamRow>("SELECT * FROM hackathon_teams ORDER BY created_at DESC")
                .fetch_all(pool)
                .await?
        }
    };

    let members = sqlx::query_as::<_, TeamMemberRow>(
        r#"
        SELECT m.id, m.team_id, m.user_id, m.name, m.role, m.email, m.avatar_url, m.skills
        FROM team_members m
        JOIN hackathon_teams t ON m.team_id = t.id
        WHERE ? IS NULL OR t.hackathon_id = ?
        ORDER BY m.team_id, m.position ASC
        "#,
    )
    .bind(hackathon_id)
    .bind(hackathon_id)
    .fetch_all(pool)
    .await?;

    let mut by_team: HashMap<String, Vec<TeamMember>> = HashMap::new();
    for member in members {
        by_team
            .entry(member.team_id.clone())
            .or_default()
            .push(member.into());
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let members = by_team.remove(&row.id).unwrap_or_default();
            HackathonTeam::from_parts(row, members)
        })
        .collect())
}

pub async fn fetch_team(pool: &sqlx::SqlitePool, id: &str) -> Result<HackathonTeam> {
    let row = sqlx::query_as::<_, TeamRow>("SELECT * FROM hackathon_teams WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Team not found".to_string()))?;

    let members = sqlx::query_as::<_, TeamMemberRow>(
        "SELECT id, team_id, user_id, name, role, email, avatar_url, skills FROM team_members WHERE team_id = ? ORDER BY position ASC",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(HackathonTeam::from_parts(
        row,
        members.into_iter().map(TeamMember::from).collect(),
    ))
}

/// Display name for a caller: their profile name, else their username.
async fn display_name(pool: &sqlx::SqlitePool, user: &AuthUser) -> Result<(String, String)> {
    if let Some(profile) = load_student_profile(pool, &user.id).await? {
        if !profile.name.is_empty() {
            return Ok((profile.name, profile.avatar_url));
        }
    }
    let account = find_user(pool, &user.id).await?;
    Ok((account.username, String::new()))
}

/// Explicit openings, capped at the open spots; without any, each open spot
/// becomes "Any Role".
fn openings_for(requested: Vec<RoleOpening>, open_spots: i64) -> Vec<RoleOpening> {
    let open_spots = usize::try_from(open_spots).unwrap_or(0);
    let requested: Vec<RoleOpening> = requested
        .into_iter()
        .filter(|o| !o.role.trim().is_empty())
        .map(|o| RoleOpening {
            role: o.role.trim().to_string(),
            skills: clean_list(o.skills),
        })
        .take(open_spots)
        .collect();

    if !requested.is_empty() {
        return requested;
    }

    (0..open_spots)
        .map(|_| RoleOpening {
            role: ANY_ROLE.to_string(),
            skills: Vec::new(),
        })
        .collect()
}

async fn list_teams(
    State(state): State<AppState>,
    Query(filter): Query<TeamFilter>,
) -> Result<Json<TeamListResponse>> {
    let teams = filter.apply(fetch_teams(&state.db.pool, None).await?);
    Ok(Json(TeamListResponse { teams }))
}

async fn list_roles(State(state): State<AppState>) -> Result<Json<RolesResponse>> {
    let teams = fetch_teams(&state.db.pool, None).await?;
    Ok(Json(RolesResponse {
        roles: filters::roles(&teams),
    }))
}

async fn get_team(
    State(state): State<AppState>,
    caller: MaybeAuthUser,
    Path(id): Path<String>,
) -> Result<Json<TeamDetailResponse>> {
    let team = fetch_team(&state.db.pool, &id).await?;
    let hackathon = fetch_hackathon(&state.db.pool, &team.hackathon_id).await?;

    let lead = match team.lead().and_then(|m| m.user_id.as_deref()) {
        Some(lead_id) => load_student_profile(&state.db.pool, lead_id).await?,
        None => None,
    };

    Ok(Json(TeamDetailResponse::build(
        team,
        hackathon,
        lead,
        caller.id(),
    )))
}

pub async fn register_team(
    State(state): State<AppState>,
    user: AuthUser,
    Path(hackathon_id): Path<String>,
    Json(body): Json<RegisterTeamRequest>,
) -> Result<(StatusCode, Json<HackathonTeam>)> {
    let hackathon = fetch_hackathon(&state.db.pool, &hackathon_id).await?;

    require_field(&body.name, "team name")?;
    require_field(&body.description, "description")?;
    if !(1..=MAX_TEAM_SIZE).contains(&body.team_size) {
        return Err(AppError::Validation(format!(
            "Team size must be between 1 and {MAX_TEAM_SIZE}"
        )));
    }

    // Only rows with both a name and a role become members
    let extra: Vec<NewMember> = body
        .members
        .into_iter()
        .filter(|m| !m.name.trim().is_empty() && !m.role.trim().is_empty())
        .collect();

    let member_count = 1 + extra.len() as i64;
    if member_count > body.team_size {
        return Err(AppError::Validation(format!(
            "A team of {} cannot have {member_count} members",
            body.team_size
        )));
    }

    let looking_for = openings_for(body.looking_for, body.team_size - member_count);
    let (lead_name, lead_avatar) = display_name(&state.db.pool, &user).await?;

    let team_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    let mut tx = state.db.pool.begin().await?;

    sqlx::query(
        "INSERT INTO hackathon_teams (id, hackathon_id, created_by, name, description, team_size, looking_for, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&team_id)
    .bind(&hackathon.id)
    .bind(&user.id)
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(body.team_size)
    .bind(JsonColumn(&looking_for))
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    let lead = (
        Some(user.id.clone()),
        lead_name,
        LEAD_ROLE.to_string(),
        user.email.clone(),
        lead_avatar,
        Vec::new(),
    );
    let others = extra.into_iter().map(|m| {
        (
            None,
            m.name.trim().to_string(),
            m.role.trim().to_string(),
            String::new(),
            String::new(),
            clean_list(m.skills),
        )
    });

    for (position, (user_id, name, role, email, avatar_url, skills)) in
        std::iter::once(lead).chain(others).enumerate()
    {
        sqlx::query(
            "INSERT INTO team_members (id, team_id, user_id, name, role, email, avatar_url, skills, position, joined_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&team_id)
        .bind(user_id)
        .bind(name)
        .bind(role)
        .bind(email)
        .bind(avatar_url)
        .bind(JsonColumn(skills))
        .bind(position as i64)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(team_id = %team_id, hackathon_id = %hackathon.id, "team registered");
    state
        .feed
        .publish(Collection::Teams, &team_id, ChangeKind::Created)
        .await;

    let team = fetch_team(&state.db.pool, &team_id).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

async fn join_team(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Option<Json<JoinTeamRequest>>,
) -> Result<Json<HackathonTeam>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let role = body
        .role
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "Member".to_string());
    let (name, avatar_url) = display_name(&state.db.pool, &user).await?;

    let mut tx = state.db.pool.begin().await?;

    // The capacity check and the insert are one statement, so concurrent
    // joins cannot push a team past its size
    let inserted = sqlx::query(
        r#"
        INSERT INTO team_members (id, team_id, user_id, name, role, email, avatar_url, skills, position, joined_at)
        SELECT ?, t.id, ?, ?, ?, ?, ?, ?,
               (SELECT COALESCE(MAX(position), -1) + 1 FROM team_members WHERE team_id = t.id), ?
        FROM hackathon_teams t
        WHERE t.id = ?
          AND (SELECT COUNT(*) FROM team_members WHERE team_id = t.id) < t.team_size
          AND NOT EXISTS (SELECT 1 FROM team_members WHERE team_id = t.id AND user_id = ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&user.id)
    .bind(&name)
    .bind(&role)
    .bind(&user.email)
    .bind(&avatar_url)
    .bind(JsonColumn(clean_list(body.skills)))
    .bind(Utc::now().to_rfc3339())
    .bind(&id)
    .bind(&user.id)
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        tx.rollback().await?;
        let team = fetch_team(&state.db.pool, &id).await?;
        if team.member_ids.iter().any(|m| m == &user.id) {
            return Err(AppError::Conflict("You are already on this team".to_string()));
        }
        return Err(AppError::Conflict("Team is full".to_string()));
    }

    // Fill the matching opening, or a generic one
    let looking_for = sqlx::query_scalar::<_, JsonColumn<Vec<RoleOpening>>>(
        "SELECT looking_for FROM hackathon_teams WHERE id = ?",
    )
    .bind(&id)
    .fetch_one(&mut *tx)
    .await?;

    let mut openings = looking_for.0;
    let slot = openings
        .iter()
        .position(|o| o.role == role)
        .or_else(|| openings.iter().position(|o| o.role == ANY_ROLE));
    if let Some(slot) = slot {
        openings.remove(slot);
        sqlx::query("UPDATE hackathon_teams SET looking_for = ? WHERE id = ?")
            .bind(JsonColumn(&openings))
            .bind(&id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(team_id = %id, user_id = %user.id, "member joined team");
    state
        .feed
        .publish(Collection::Teams, &id, ChangeKind::Updated)
        .await;

    Ok(Json(fetch_team(&state.db.pool, &id).await?))
}

async fn leave_team(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<HackathonTeam>> {
    let team = fetch_team(&state.db.pool, &id).await?;
    if team.created_by == user.id {
        return Err(AppError::BadRequest(
            "The team lead cannot leave the team".to_string(),
        ));
    }

    let mut tx = state.db.pool.begin().await?;

    let removed = sqlx::query_as::<_, (String, JsonColumn<Vec<String>>)>(
        "DELETE FROM team_members WHERE team_id = ? AND user_id = ? RETURNING role, skills",
    )
    .bind(&id)
    .bind(&user.id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((role, skills)) = removed else {
        tx.rollback().await?;
        return Err(AppError::NotFound("You are not on this team".to_string()));
    };

    // Current openings, read under the same write as the delete
    let looking_for = sqlx::query_scalar::<_, JsonColumn<Vec<RoleOpening>>>(
        "SELECT looking_for FROM hackathon_teams WHERE id = ?",
    )
    .bind(&id)
    .fetch_one(&mut *tx)
    .await?;

    let mut openings = looking_for.0;
    openings.push(RoleOpening {
        role,
        skills: skills.0,
    });

    sqlx::query("UPDATE hackathon_teams SET looking_for = ? WHERE id = ?")
        .bind(JsonColumn(&openings))
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    state
        .feed
        .publish(Collection::Teams, &id, ChangeKind::Updated)
        .await;

    Ok(Json(fetch_team(&state.db.pool, &id).await?))
}

async fn delete_team(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let team = fetch_team(&state.db.pool, &id).await?;
    require_owner(&team.created_by, &user.id, "delete this team")?;

    sqlx::query("DELETE FROM hackathon_teams WHERE id = ?")
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    tracing::info!(team_id = %id, "team deleted");
    state
        .feed
        .publish(Collection::Teams, &id, ChangeKind::Deleted)
        .await;

    Ok(StatusCode::NO_CONTENT)
}
