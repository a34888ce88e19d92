//! OAuth2 identity provider capability and its Keycloak/OpenID Connect implementation.

use crate::config::WeheatConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

/// Token set returned by a successful password or refresh grant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(rename = "expires_in")]
    pub expires_in_secs: i64,
}

/// Opaque OAuth2 token source.
///
/// `token` and `refresh` fail with [`AppError::Authentication`] when the provider
/// rejects the grant and with [`AppError::Transport`] for network/service trouble.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn token(&self, username: &str, password: &str) -> Result<TokenSet>;
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet>;
    async fn revoke(&self, refresh_token: &str) -> Result<()>;
}

pub struct KeycloakProvider {
    http: reqwest::Client,
    token_url: String,
    logout_url: String,
    client_id: String,
    client_secret: String,
}

impl KeycloakProvider {
    pub fn new(http: reqwest::Client, cfg: &WeheatConfig) -> Self {
        let base = format!(
            "{}/realms/{}/protocol/openid-connect",
            cfg.auth_url.trim_end_matches('/'),
            cfg.realm
        );
        Self {
            http,
            token_url: format!("{}/token", base),
            logout_url: format!("{}/logout", base),
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
        }
    }

    fn client_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("client_id", self.client_id.clone())];
        if !self.client_secret.is_empty() {
            params.push(("client_secret", self.client_secret.clone()));
        }
        params
    }

    async fn grant(&self, params: Vec<(&'static str, String)>) -> Result<TokenSet> {
        let res = self.http.post(&self.token_url).form(&params).send().await?;
        let status = res.status();
        if status.is_success() {
            let tokens: TokenSet = res.json().await?;
            debug!(expires_in = tokens.expires_in_secs, "token grant succeeded");
            return Ok(tokens);
        }
        let body = res.text().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }
}

/// Keycloak answers bad credentials and dead refresh tokens with 400/401 `invalid_grant`.
fn classify_failure(status: StatusCode, body: &str) -> AppError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::Authentication(format!("HTTP {}: {}", status.as_u16(), body))
        }
        _ => AppError::Transport(format!("HTTP {}: {}", status.as_u16(), body)),
    }
}

#[async_trait]
impl IdentityProvider for KeycloakProvider {
    async fn token(&self, username: &str, password: &str) -> Result<TokenSet> {
        let mut params = self.client_params();
        params.push(("grant_type", "password".into()));
        params.push(("scope", "openid".into()));
        params.push(("username", username.to_string()));
        params.push(("password", password.to_string()));
        self.grant(params).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        let mut params = self.client_params();
        params.push(("grant_type", "refresh_token".into()));
        params.push(("refresh_token", refresh_token.to_string()));
        self.grant(params).await
    }

    async fn revoke(&self, refresh_token: &str) -> Result<()> {
        let mut params = self.client_params();
        params.push(("refresh_token", refresh_token.to_string()));
        let res = self.http.post(&self.logout_url).form(&params).send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(());
        }
        let body = res.text().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(auth_url: &str) -> WeheatConfig {
        WeheatConfig {
            auth_url: auth_url.into(),
            realm: "WeHeat".into(),
            client_id: "WeheatCommunityAPI".into(),
            client_secret: String::new(),
            api_url: "https://api.weheat.nl".into(),
            username: "u".into(),
            password: "p".into(),
        }
    }

    #[test]
    fn test_endpoint_urls() {
        let p = KeycloakProvider::new(reqwest::Client::new(), &cfg("https://auth.weheat.nl/auth/"));
        assert_eq!(
            p.token_url,
            "https://auth.weheat.nl/auth/realms/WeHeat/protocol/openid-connect/token"
        );
        assert_eq!(
            p.logout_url,
            "https://auth.weheat.nl/auth/realms/WeHeat/protocol/openid-connect/logout"
        );
    }

    #[test]
    fn test_client_secret_only_sent_when_set() {
        let mut c = cfg("http://localhost/auth");
        let p = KeycloakProvider::new(reqwest::Client::new(), &c);
        assert_eq!(p.client_params().len(), 1);

        c.client_secret = "abc".into();
        let p = KeycloakProvider::new(reqwest::Client::new(), &c);
        assert_eq!(p.client_params().len(), 2);
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, "invalid_grant"),
            AppError::Authentication(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, "invalid_grant"),
            AppError::Authentication(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_GATEWAY, ""),
            AppError::Transport(_)
        ));
    }
}
