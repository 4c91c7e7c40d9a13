use serde::{Deserialize, Serialize};
use sqlx::types::Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Student,
    Client,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Availability {
    #[default]
    Available,
    Busy,
    #[serde(rename = "On a project")]
    #[sqlx(rename = "On a project")]
    OnAProject,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Available => "Available",
            Availability::Busy => "Busy",
            Availability::OnAProject => "On a project",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum StartupStatus {
    Hiring,
    #[serde(rename = "Funding Open")]
    #[sqlx(rename = "Funding Open")]
    FundingOpen,
    #[default]
    #[serde(rename = "Accepting Partnerships")]
    #[sqlx(rename = "Accepting Partnerships")]
    AcceptingPartnerships,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum HackathonMode {
    Online,
    Offline,
}

impl HackathonMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HackathonMode::Online => "Online",
            HackathonMode::Offline => "Offline",
        }
    }
}

// Nested value types, stored as JSON columns

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Education {
    pub university: String,
    pub degree: String,
    pub years: String,
    pub current: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Certification {
    pub name: String,
    pub issuer: String,
    pub date: String,
    pub credential_url: String,
    pub logo: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Socials {
    pub resume_url: String,
    pub portfolio_url: String,
    pub github_url: String,
    pub linkedin_url: String,
    pub instagram_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
    pub rating: f64,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PortfolioProject {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub github_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub name: String,
    pub role: String,
    pub avatar_url: String,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Offering {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Milestone {
    pub date: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleOpening {
    pub role: String,
    pub skills: Vec<String>,
}

// Records

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub auth_provider: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StudentProfileRow {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: String,
    pub tagline: String,
    pub location: String,
    pub bio: String,
    pub skills: Json<Vec<String>>,
    pub availability: Availability,
    pub rating: f64,
    pub is_freelancing: bool,
    pub education: Json<Education>,
    pub certifications: Json<Vec<Certification>>,
    pub socials: Json<Socials>,
    pub portfolio: Json<Vec<PortfolioProject>>,
    pub reviews: Json<Vec<Review>>,
    pub updated_at: String,
}

/// A student profile as exposed to callers; also the freelancer listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: String,
    pub tagline: String,
    pub location: String,
    pub bio: String,
    pub skills: Vec<String>,
    pub availability: Availability,
    pub rating: f64,
    pub is_freelancing: bool,
    pub education: Education,
    pub certifications: Vec<Certification>,
    pub socials: Socials,
    pub portfolio: Vec<PortfolioProject>,
    pub reviews: Vec<Review>,
    pub updated_at: Option<String>,
}

impl StudentProfile {
    /// Blank profile pre-filled from the owning user, before the first save.
    pub fn prefilled(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            user_id: user.id.clone(),
            name: user.username.clone(),
            email: user.email.clone(),
            avatar_url: String::new(),
            tagline: String::new(),
            location: String::new(),
            bio: String::new(),
            skills: Vec::new(),
            availability: Availability::Available,
            rating: 0.0,
            is_freelancing: false,
            education: Education::default(),
            certifications: Vec::new(),
            socials: Socials::default(),
            portfolio: Vec::new(),
            reviews: Vec::new(),
            updated_at: None,
        }
    }
}

impl From<StudentProfileRow> for StudentProfile {
    fn from(row: StudentProfileRow) -> Self {
        Self {
            id: row.user_id.clone(),
            user_id: row.user_id,
            name: row.name,
            email: row.email,
            avatar_url: row.avatar_url,
            tagline: row.tagline,
            location: row.location,
            bio: row.bio,
            skills: row.skills.0,
            availability: row.availability,
            rating: row.rating,
            is_freelancing: row.is_freelancing,
            education: row.education.0,
            certifications: row.certifications.0,
            socials: row.socials.0,
            portfolio: row.portfolio.0,
            reviews: row.reviews.0,
            updated_at: Some(row.updated_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ClientProfile {
    pub user_id: String,
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StartupRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub logo_url: String,
    pub tagline: String,
    pub industry: String,
    pub location: String,
    pub founding_year: i64,
    pub years_in_industry: i64,
    pub problem: String,
    pub solution: String,
    pub vision: String,
    pub market_size: String,
    pub contact_email: String,
    pub funding_stage: String,
    pub status: StartupStatus,
    pub founders: Json<Vec<Person>>,
    pub team: Json<Vec<Person>>,
    pub offerings: Json<Vec<Offering>>,
    pub milestones: Json<Vec<Milestone>>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Startup {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub logo_url: String,
    pub tagline: String,
    pub industry: String,
    pub location: String,
    pub founding_year: i64,
    pub years_in_industry: i64,
    pub problem: String,
    pub solution: String,
    pub vision: String,
    pub market_size: String,
    pub contact_email: String,
    pub funding_stage: String,
    pub status: StartupStatus,
    pub founders: Vec<Person>,
    pub team: Vec<Person>,
    pub offerings: Vec<Offering>,
    pub milestones: Vec<Milestone>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<StartupRow> for Startup {
    fn from(row: StartupRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            logo_url: row.logo_url,
            tagline: row.tagline,
            industry: row.industry,
            location: row.location,
            founding_year: row.founding_year,
            years_in_industry: row.years_in_industry,
            problem: row.problem,
            solution: row.solution,
            vision: row.vision,
            market_size: row.market_size,
            contact_email: row.contact_email,
            funding_stage: row.funding_stage,
            status: row.status,
            founders: row.founders.0,
            team: row.team.0,
            offerings: row.offerings.0,
            milestones: row.milestones.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HackathonRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub organizer: String,
    pub date: String,
    pub location: String,
    pub mode: HackathonMode,
    pub tech_stack: Json<Vec<String>>,
    pub prize: String,
    pub image_url: String,
    pub description: String,
    pub official_url: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hackathon {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub organizer: String,
    pub date: String,
    pub location: String,
    pub mode: HackathonMode,
    pub tech_stack: Vec<String>,
    pub prize: String,
    pub image_url: String,
    pub description: String,
    pub official_url: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<HackathonRow> for Hackathon {
    fn from(row: HackathonRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            organizer: row.organizer,
            date: row.date,
            location: row.location,
            mode: row.mode,
            tech_stack: row.tech_stack.0,
            prize: row.prize,
            image_url: row.image_url,
            description: row.description,
            official_url: row.official_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TeamRow {
    pub id: String,
    pub hackathon_id: String,
    pub created_by: String,
    pub name: String,
    pub description: String,
    pub team_size: i64,
    pub looking_for: Json<Vec<RoleOpening>>,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TeamMemberRow {
    pub id: String,
    pub team_id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub role: String,
    pub email: String,
    pub avatar_url: String,
    pub skills: Json<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub role: String,
    pub email: Option<String>,
    pub avatar_url: String,
    pub skills: Vec<String>,
}

impl From<TeamMemberRow> for TeamMember {
    fn from(row: TeamMemberRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            role: row.role,
            email: Some(row.email).filter(|e| !e.is_empty()),
            avatar_url: row.avatar_url,
            skills: row.skills.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HackathonTeam {
    pub id: String,
    pub hackathon_id: String,
    pub created_by: String,
    pub name: String,
    pub description: String,
    pub team_size: i64,
    pub looking_for: Vec<RoleOpening>,
    pub members: Vec<TeamMember>,
    pub member_ids: Vec<String>,
    pub created_at: String,
}

impl HackathonTeam {
    pub fn from_parts(row: TeamRow, members: Vec<TeamMember>) -> Self {
        let member_ids = members
            .iter()
            .map(|m| m.user_id.clone().unwrap_or_else(|| m.id.clone()))
            .collect();

        Self {
            id: row.id,
            hackathon_id: row.hackathon_id,
            created_by: row.created_by,
            name: row.name,
            description: row.description,
            team_size: row.team_size,
            looking_for: row.looking_for.0,
            members,
            member_ids,
            created_at: row.created_at,
        }
    }

    pub fn roles_needed(&self) -> i64 {
        (self.team_size - self.members.len() as i64).max(0)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() as i64 >= self.team_size
    }

    /// First member whose role names them as lead.
    pub fn lead(&self) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.role.contains("Lead"))
    }
}
