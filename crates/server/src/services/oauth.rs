//! Google and GitHub sign-in through the OAuth 2.0 authorization-code flow
//! with PKCE.
//!
//! The browser is sent to the provider with a random `state`; the provider
//! redirects back to the web app, which posts the code and state to the API.
//! The API exchanges the code, reads the verified account email, and issues
//! its own session token.

use std::time::Duration;

use axum::async_trait;
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
};
use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    config::{OAuthConfig, OAuthCredentials},
    error::{AppError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    GitHub,
}

impl OAuthProvider {
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "google" => Some(OAuthProvider::Google),
            "github" => Some(OAuthProvider::GitHub),
            _ => None,
        }
    }

    /// Stored as the account's `auth_provider`.
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::GitHub => "github",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "Google",
            OAuthProvider::GitHub => "GitHub",
        }
    }

    fn auth_url(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            OAuthProvider::GitHub => "https://github.com/login/oauth/authorize",
        }
    }

    fn token_url(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "https://oauth2.googleapis.com/token",
            OAuthProvider::GitHub => "https://github.com/login/oauth/access_token",
        }
    }

    fn scopes(&self) -> &'static [&'static str] {
        match self {
            OAuthProvider::Google => &["openid", "email", "profile"],
            OAuthProvider::GitHub => &["read:user", "user:email"],
        }
    }
}

/// Where to send the browser, plus the values needed to finish the flow.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub pkce_verifier: String,
}

/// The account the provider vouched for.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalIdentity {
    pub email: String,
    pub name: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn authorize(&self, provider: OAuthProvider) -> Result<AuthorizationRequest>;

    async fn exchange(
        &self,
        provider: OAuthProvider,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<ExternalIdentity>;
}

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

pub struct OAuthClient {
    http: reqwest::Client,
    config: OAuthConfig,
    public_url: String,
}

impl OAuthClient {
    pub fn new(config: &OAuthConfig, public_url: &str) -> Result<Self> {
        // Token endpoints must not follow redirects
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("campushub-server/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config: config.clone(),
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    fn credentials(&self, provider: OAuthProvider) -> Result<&OAuthCredentials> {
        let credentials = match provider {
            OAuthProvider::Google => self.config.google.as_ref(),
            OAuthProvider::GitHub => self.config.github.as_ref(),
        };
        credentials.ok_or_else(|| {
            AppError::BadRequest(format!("{} sign-in is not enabled", provider.label()))
        })
    }

    fn client(&self, provider: OAuthProvider) -> Result<ConfiguredClient> {
        let credentials = self.credentials(provider)?;
        let invalid = |e: oauth2::url::ParseError| {
            AppError::Internal(format!("Invalid {} OAuth endpoint: {e}", provider.label()))
        };

        Ok(BasicClient::new(ClientId::new(credentials.client_id.clone()))
            .set_client_secret(ClientSecret::new(credentials.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(provider.auth_url().to_string()).map_err(invalid)?)
            .set_token_uri(TokenUrl::new(provider.token_url().to_string()).map_err(invalid)?)
            .set_redirect_uri(
                RedirectUrl::new(format!(
                    "{}/auth/callback/{}",
                    self.public_url,
                    provider.as_str()
                ))
                .map_err(invalid)?,
            ))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        provider: OAuthProvider,
        url: &str,
        access_token: &str,
    ) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("{} is unavailable: {e}", provider.label())))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, provider = provider.as_str(), "profile lookup failed");
            return Err(AppError::Upstream(format!(
                "{} profile lookup failed ({})",
                provider.label(),
                status.as_u16()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Malformed {} response: {e}", provider.label())))
    }

    async fn google_identity(&self, access_token: &str) -> Result<ExternalIdentity> {
        let info: GoogleUserInfo = self
            .get_json(
                OAuthProvider::Google,
                "https://openidconnect.googleapis.com/v1/userinfo",
                access_token,
            )
            .await?;

        match info.email {
            Some(email) if info.email_verified => Ok(ExternalIdentity {
                email,
                name: info.name.unwrap_or_default(),
            }),
            _ => Err(unverified(OAuthProvider::Google)),
        }
    }

    async fn github_identity(&self, access_token: &str) -> Result<ExternalIdentity> {
        let user: GitHubUser = self
            .get_json(OAuthProvider::GitHub, "https://api.github.com/user", access_token)
            .await?;
        let emails: Vec<GitHubEmail> = self
            .get_json(
                OAuthProvider::GitHub,
                "https://api.github.com/user/emails",
                access_token,
            )
            .await?;

        let email = primary_verified_email(emails).ok_or_else(|| unverified(OAuthProvider::GitHub))?;

        Ok(ExternalIdentity {
            email,
            name: user.name.filter(|n| !n.trim().is_empty()).unwrap_or(user.login),
        })
    }
}

fn unverified(provider: OAuthProvider) -> AppError {
    AppError::BadRequest(format!(
        "Your {} account has no verified email address.",
        provider.label()
    ))
}

fn primary_verified_email(emails: Vec<GitHubEmail>) -> Option<String> {
    emails
        .into_iter()
        .filter(|e| e.verified)
        .max_by_key(|e| e.primary)
        .map(|e| e.email)
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

#[async_trait]
impl IdentityProvider for OAuthClient {
    fn authorize(&self, provider: OAuthProvider) -> Result<AuthorizationRequest> {
        let client = self.client(provider)?;
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();

        let (url, state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(provider.scopes().iter().map(|s| Scope::new(s.to_string())))
            .set_pkce_challenge(challenge)
            .url();

        Ok(AuthorizationRequest {
            url: url.to_string(),
            state: state.secret().clone(),
            pkce_verifier: verifier.secret().clone(),
        })
    }

    async fn exchange(
        &self,
        provider: OAuthProvider,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<ExternalIdentity> {
        let client = self.client(provider)?;

        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| {
                tracing::warn!(provider = provider.as_str(), "code exchange failed: {e}");
                AppError::Upstream(format!("{} rejected the sign-in", provider.label()))
            })?;

        let access_token = token.access_token().secret();
        match provider {
            OAuthProvider::Google => self.google_identity(access_token).await,
            OAuthProvider::GitHub => self.github_identity(access_token).await,
        }
    }
}
