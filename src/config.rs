use serde::Deserialize;
use std::fmt;
use std::{fs, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub weheat: WeheatConfig,
    #[serde(default)]
    pub host: HostConfig,
}

#[derive(Clone, Deserialize)]
pub struct WeheatConfig {
    /// Base URL of the Keycloak server, including the trailing `auth/`
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_realm")]
    pub realm: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

// Keep credentials out of log lines and panic messages.
impl fmt::Debug for WeheatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeheatConfig")
            .field("auth_url", &self.auth_url)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &mask(&self.client_secret))
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &mask(&self.password))
            .finish()
    }
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "********"
    }
}

fn default_auth_url() -> String {
    "https://auth.weheat.nl/auth/".into()
}

fn default_realm() -> String {
    "WeHeat".into()
}

fn default_client_id() -> String {
    "WeheatCommunityAPI".into()
}

fn default_api_url() -> String {
    "https://api.weheat.nl".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    /// Period of the host heartbeat; the remote is polled every
    /// `heartbeat_secs * THROTTLE_FACTOR` seconds.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Debug verbosity: enables debug-level logs and the slot dump after start
    #[serde(default)]
    pub debug: bool,
}

fn default_heartbeat_secs() -> u64 {
    15
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            debug: false,
        }
    }
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    /// Afterwards, WEHEAT_USERNAME / WEHEAT_PASSWORD override the credentials.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let raw = fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, anyhow::Error> {
        let expanded = expand_env_placeholders(raw)?;
        let mut cfg: Self = serde_yaml::from_str(&expanded)?;

        if let Ok(username) = std::env::var("WEHEAT_USERNAME") {
            cfg.weheat.username = username;
        }
        if let Ok(password) = std::env::var("WEHEAT_PASSWORD") {
            cfg.weheat.password = password;
        }

        anyhow::ensure!(
            !cfg.weheat.username.is_empty(),
            "weheat.username must be set"
        );
        anyhow::ensure!(
            !cfg.weheat.password.is_empty(),
            "weheat.password must be set"
        );
        anyhow::ensure!(
            cfg.host.heartbeat_secs > 0,
            "host.heartbeat_secs must be greater than zero"
        );
        Ok(cfg)
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
/// "$$" becomes a literal "$"; any other "$" is kept as-is.
fn expand_env_placeholders(input: &str) -> Result<String, anyhow::Error> {
    use anyhow::Context;

    let mut out = String::with_capacity(input.len());
    let mut it = input.chars().peekable();

    while let Some(c) = it.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let close = match it.peek().copied() {
            Some('$') => {
                it.next();
                out.push('$');
                continue;
            }
            Some('(') => ')',
            Some('{') => '}',
            _ => {
                out.push('$');
                continue;
            }
        };
        it.next();
        let var = read_until(&mut it, close)
            .with_context(|| format!("unterminated env placeholder: missing '{}'", close))?;
        let val = std::env::var(&var)
            .with_context(|| format!("missing environment variable: {}", var))?;
        out.push_str(&val);
    }

    Ok(out)
}

/// Read characters until `end`, consuming the delimiter.
fn read_until<I>(it: &mut std::iter::Peekable<I>, end: char) -> Option<String>
where
    I: Iterator<Item = char>,
{
    let mut buf = String::new();
    for ch in it.by_ref() {
        if ch == end {
            return Some(buf);
        }
        buf.push(ch);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_overrides() {
        std::env::remove_var("WEHEAT_USERNAME");
        std::env::remove_var("WEHEAT_PASSWORD");
    }

    #[test]
    #[serial]
    fn test_defaults_applied() {
        clear_overrides();
        let cfg = Config::from_yaml(
            r#"
weheat:
  username: "jane@example.com"
  password: "hunter2"
"#,
        )
        .unwrap();

        assert_eq!(cfg.weheat.auth_url, "https://auth.weheat.nl/auth/");
        assert_eq!(cfg.weheat.realm, "WeHeat");
        assert_eq!(cfg.weheat.client_id, "WeheatCommunityAPI");
        assert_eq!(cfg.weheat.api_url, "https://api.weheat.nl");
        assert_eq!(cfg.host.heartbeat_secs, 15);
        assert!(!cfg.host.debug);
    }

    #[test]
    #[serial]
    fn test_placeholders_expanded() {
        clear_overrides();
        std::env::set_var("WEHEAT_TEST_SECRET", "s3cret");
        let cfg = Config::from_yaml(
            r#"
weheat:
  username: "jane"
  password: "$(WEHEAT_TEST_SECRET)"
  client_secret: "${WEHEAT_TEST_SECRET}"
"#,
        )
        .unwrap();
        std::env::remove_var("WEHEAT_TEST_SECRET");

        assert_eq!(cfg.weheat.password, "s3cret");
        assert_eq!(cfg.weheat.client_secret, "s3cret");
    }

    #[test]
    #[serial]
    fn test_missing_placeholder_is_an_error() {
        clear_overrides();
        std::env::remove_var("WEHEAT_TEST_UNSET");
        let res = Config::from_yaml(
            r#"
weheat:
  username: "jane"
  password: "$(WEHEAT_TEST_UNSET)"
"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_dollar_escape() {
        assert_eq!(expand_env_placeholders("a$$b").unwrap(), "a$b");
        assert_eq!(expand_env_placeholders("cost: 5$").unwrap(), "cost: 5$");
        assert!(expand_env_placeholders("$(OPEN").is_err());
    }

    #[test]
    #[serial]
    fn test_empty_credentials_rejected() {
        clear_overrides();
        let res = Config::from_yaml(
            r#"
weheat:
  username: "jane"
"#,
        );
        assert!(res.is_err());
    }

    #[test]
    #[serial]
    fn test_zero_heartbeat_rejected() {
        clear_overrides();
        let res = Config::from_yaml(
            r#"
weheat:
  username: "jane"
  password: "pw"
host:
  heartbeat_secs: 0
"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_debug_masks_password() {
        let cfg = WeheatConfig {
            auth_url: default_auth_url(),
            realm: default_realm(),
            client_id: default_client_id(),
            client_secret: String::new(),
            api_url: default_api_url(),
            username: "jane".into(),
            password: "hunter2".into(),
        };
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("jane"));
    }

    #[test]
    #[serial]
    fn test_whole_config_debug_masks_secrets() {
        clear_overrides();
        let cfg = Config::from_yaml(
            r#"
weheat:
  username: "jane"
  password: "hunter2"
  client_secret: "cl1ent-s3cret"
host:
  debug: true
"#,
        )
        .unwrap();

        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("cl1ent-s3cret"));
        assert!(printed.contains("heartbeat_secs: 15"));
    }
}
