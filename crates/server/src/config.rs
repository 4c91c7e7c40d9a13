use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub media_path: String,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    /// Externally visible origin, used for emailed links and OAuth redirects.
    pub public_url: String,
    pub matcher: MatcherConfig,
    pub oauth: OAuthConfig,
}

/// Settings for the hosted text-generation endpoint used by smart matching.
#[derive(Clone, Debug)]
pub struct MatcherConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Sign-in providers; a provider without credentials is disabled.
#[derive(Clone, Debug, Default)]
pub struct OAuthConfig {
    pub google: Option<OAuthCredentials>,
    pub github: Option<OAuthCredentials>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: parsed("PORT", 3000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/campushub.db?mode=rwc".to_string()),
            media_path: env::var("MEDIA_PATH").unwrap_or_else(|_| "./data/media".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "development-secret-change-in-production".to_string()),
            token_ttl_days: parsed("TOKEN_TTL_DAYS", 7),
            public_url: env::var("PUBLIC_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            matcher: MatcherConfig {
                base_url: env::var("MATCHER_BASE_URL")
                    .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
                model: env::var("MATCHER_MODEL")
                    .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
                api_key: env::var("MATCHER_API_KEY")
                    .ok()
                    .filter(|k| !k.trim().is_empty()),
                timeout_secs: parsed("MATCHER_TIMEOUT_SECS", 30),
            },
            oauth: OAuthConfig {
                google: credentials("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
                github: credentials("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
            },
        }
    }
}

fn credentials(id_key: &str, secret_key: &str) -> Option<OAuthCredentials> {
    let client_id = env::var(id_key).ok().filter(|v| !v.trim().is_empty())?;
    let client_secret = env::var(secret_key).ok().filter(|v| !v.trim().is_empty())?;
    Some(OAuthCredentials {
        client_id,
        client_secret,
    })
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {key} value {raw:?}, using default");
            default
        }),
        Err(_) => default,
    }
}
