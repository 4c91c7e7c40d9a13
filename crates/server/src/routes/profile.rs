use axum::{
    extract::{Multipart, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as JsonColumn;

use crate::{
    db::models::{
        Availability, Certification, ClientProfile, Education, PortfolioProject, Role, Socials,
        StudentProfile, StudentProfileRow,
    },
    error::{AppError, Result},
    handlers::ws::{ChangeKind, Collection},
    middleware::auth::AuthUser,
    routes::{auth::find_user, clean_list, read_image_upload},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_profile))
        .route("/student", put(update_student_profile))
        .route("/client", put(update_client_profile))
        .route("/avatar", post(upload_avatar))
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", content = "profile", rename_all = "lowercase")]
pub enum ProfileResponse {
    Student(StudentProfile),
    Client(ClientProfile),
}

/// Merge-write body: absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudentProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub tagline: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub availability: Option<Availability>,
    pub is_freelancing: Option<bool>,
    pub education: Option<Education>,
    pub certifications: Option<Vec<Certification>>,
    pub socials: Option<Socials>,
    pub portfolio: Option<Vec<PortfolioProject>>,
}

impl UpdateStudentProfileRequest {
    fn merge_into(self, profile: &mut StudentProfile) {
        if let Some(name) = self.name {
            profile.name = name.trim().to_string();
        }
        if let Some(email) = self.email {
            profile.email = email.trim().to_string();
        }
        if let Some(tagline) = self.tagline {
            profile.tagline = tagline;
        }
        if let Some(location) = self.location {
            profile.location = location;
        }
        if let Some(bio) = self.bio {
            profile.bio = bio;
        }
        if let Some(skills) = self.skills {
            profile.skills = clean_list(skills);
        }
        if let Some(availability) = self.availability {
            profile.availability = availability;
        }
        if let Some(is_freelancing) = self.is_freelancing {
            profile.is_freelancing = is_freelancing;
        }
        if let Some(education) = self.education {
            profile.education = education;
        }
        if let Some(certifications) = self.certifications {
            profile.certifications = certifications;
        }
        if let Some(socials) = self.socials {
            profile.socials = Socials {
                resume_url: ensure_protocol(&socials.resume_url),
                portfolio_url: ensure_protocol(&socials.portfolio_url),
                github_url: ensure_protocol(&socials.github_url),
                linkedin_url: ensure_protocol(&socials.linkedin_url),
                instagram_url: ensure_protocol(&socials.instagram_url),
            };
        }
        if let Some(portfolio) = self.portfolio {
            profile.portfolio = portfolio;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientProfileRequest {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
}

/// Bare hostnames get an https scheme; blank stays blank.
pub fn ensure_protocol(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || url == "#" {
        return String::new();
    }
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

pub async fn load_student_profile(
    pool: &sqlx::SqlitePool,
    user_id: &str,
) -> Result<Option<StudentProfile>> {
    let row = sqlx::query_as::<_, StudentProfileRow>("SELECT * FROM student_profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(StudentProfile::from))
}

async fn save_student_profile(pool: &sqlx::SqlitePool, profile: &StudentProfile) -> Result<String> {
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO student_profiles (
            user_id, name, email, avatar_url, tagline, location, bio, skills, availability,
            rating, is_freelancing, education, certifications, socials, portfolio, reviews, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            name = excluded.name,
            email = excluded.email,
            avatar_url = excluded.avatar_url,
            tagline = excluded.tagline,
            location = excluded.location,
            bio = excluded.bio,
            skills = excluded.skills,
            availability = excluded.availability,
            is_freelancing = excluded.is_freelancing,
            education = excluded.education,
            certifications = excluded.certifications,
            socials = excluded.socials,
            portfolio = excluded.portfolio,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&profile.user_id)
    .bind(&profile.name)
    .bind(&profile.email)
    .bind(&profile.avatar_url)
    .bind(&profile.tagline)
    .bind(&profile.location)
    .bind(&profile.bio)
    .bind(JsonColumn(&profile.skills))
    .bind(profile.availability)
    .bind(profile.rating)
    .bind(profile.is_freelancing)
    .bind(JsonColumn(&profile.education))
    .bind(JsonColumn(&profile.certifications))
    .bind(JsonColumn(&profile.socials))
    .bind(JsonColumn(&profile.portfolio))
    .bind(JsonColumn(&profile.reviews))
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(now)
}

async fn load_client_profile(pool: &sqlx::SqlitePool, user_id: &str) -> Result<Option<ClientProfile>> {
    Ok(sqlx::query_as::<_, ClientProfile>(
        "SELECT user_id, company_name, contact_name, email, updated_at FROM client_profiles WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?)
}

async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ProfileResponse>> {
    let account = find_user(&state.db.pool, &user.id).await?;

    let response = match account.role {
        Role::Student => {
            let profile = load_student_profile(&state.db.pool, &user.id)
                .await?
                .unwrap_or_else(|| StudentProfile::prefilled(&account));
            ProfileResponse::Student(profile)
        }
        Role::Client => {
            let profile = load_client_profile(&state.db.pool, &user.id)
                .await?
                .unwrap_or_else(|| ClientProfile {
                    user_id: account.id.clone(),
                    company_name: String::new(),
                    contact_name: account.username.clone(),
                    email: account.email.clone(),
                    updated_at: String::new(),
                });
            ProfileResponse::Client(profile)
        }
    };

    Ok(Json(response))
}

async fn update_student_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<UpdateStudentProfileRequest>,
) -> Result<Json<StudentProfile>> {
    if user.role != Role::Student {
        return Err(AppError::Forbidden(
            "Only student accounts have a student profile".to_string(),
        ));
    }

    let mut profile = match load_student_profile(&state.db.pool, &user.id).await? {
        Some(profile) => profile,
        None => StudentProfile::prefilled(&find_user(&state.db.pool, &user.id).await?),
    };

    body.merge_into(&mut profile);

    if profile.name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if profile.email.is_empty() {
        profile.email = user.email.clone();
    }

    let updated_at = save_student_profile(&state.db.pool, &profile).await?;
    profile.updated_at = Some(updated_at);

    state
        .feed
        .publish(Collection::Freelancers, &profile.id, ChangeKind::Updated)
        .await;

    Ok(Json(profile))
}

async fn update_client_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<UpdateClientProfileRequest>,
) -> Result<Json<ClientProfile>> {
    if user.role != Role::Client {
        return Err(AppError::Forbidden(
            "Only client accounts have a client profile".to_string(),
        ));
    }

    let existing = load_client_profile(&state.db.pool, &user.id).await?;
    let (company_name, contact_name, email) = match existing {
        Some(p) => (p.company_name, p.contact_name, p.email),
        None => (String::new(), String::new(), user.email.clone()),
    };

    let company_name = body.company_name.map(|s| s.trim().to_string()).unwrap_or(company_name);
    let contact_name = body.contact_name.map(|s| s.trim().to_string()).unwrap_or(contact_name);
    let email = body.email.map(|s| s.trim().to_string()).unwrap_or(email);

    if company_name.is_empty() {
        return Err(AppError::Validation("Company name is required".to_string()));
    }

    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO client_profiles (user_id, company_name, contact_name, email, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            company_name = excluded.company_name,
            contact_name = excluded.contact_name,
            email = excluded.email,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&user.id)
    .bind(&company_name)
    .bind(&contact_name)
    .bind(&email)
    .bind(&now)
    .execute(&state.db.pool)
    .await?;

    Ok(Json(ClientProfile {
        user_id: user.id,
        company_name,
        contact_name,
        email,
        updated_at: now,
    }))
}

async fn upload_avatar(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<StudentProfile>> {
    if user.role != Role::Student {
        return Err(AppError::Forbidden(
            "Only student accounts have a student profile".to_string(),
        ));
    }

    let (file_name, data) = read_image_upload(&mut multipart).await?;

    let url = state
        .media
        .save_image("avatars", &user.id, &file_name, &data)
        .await?;

    let mut profile = match load_student_profile(&state.db.pool, &user.id).await? {
        Some(profile) => profile,
        None => StudentProfile::prefilled(&find_user(&state.db.pool, &user.id).await?),
    };

    let previous = std::mem::replace(&mut profile.avatar_url, url);
    let updated_at = save_student_profile(&state.db.pool, &profile).await?;
    profile.updated_at = Some(updated_at);

    if let Err(e) = state.media.remove(&previous).await {
        tracing::warn!("failed to remove old avatar {previous}: {e}");
    }

    state
        .feed
        .publish(Collection::Freelancers, &profile.id, ChangeKind::Updated)
        .await;

    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_protocol_adds_https() {
        assert_eq!(ensure_protocol("github.com/ada"), "https://github.com/ada");
        assert_eq!(ensure_protocol("http://ada.dev"), "http://ada.dev");
        assert_eq!(ensure_protocol("#"), "");
        assert_eq!(ensure_protocol("  "), "");
    }

    #[test]
    fn merge_keeps_absent_fields() {
        let mut profile = StudentProfile {
            id: "u1".to_string(),
            user_id: "u1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            avatar_url: String::new(),
            tagline: "Systems".to_string(),
            location: "London".to_string(),
            bio: String::new(),
            skills: vec!["Rust".to_string()],
            availability: Availability::Busy,
            rating: 4.5,
            is_freelancing: true,
            education: Education::default(),
            certifications: vec![],
            socials: Socials::default(),
            portfolio: vec![],
            reviews: vec![],
            updated_at: None,
        };

        UpdateStudentProfileRequest {
            tagline: Some("Compilers".to_string()),
            is_freelancing: Some(false),
            ..Default::default()
        }
        .merge_into(&mut profile);

        assert_eq!(profile.tagline, "Compilers");
        assert!(!profile.is_freelancing);
        assert_eq!(profile.location, "London");
        assert_eq!(profile.skills, vec!["Rust"]);
        assert_eq!(profile.rating, 4.5);
    }
}
