//! Configuration management for the recommendation backend.
//!
//! Configuration is read from environment variables and `.env` files. Values are
//! resolved in this order:
//! 1. Environment variables (highest priority)
//! 2. `.env` in the current working directory
//! 3. `.env` in the platform config directory under `spotrec/`
//! 4. Application defaults (where applicable)
//!
//! Unlike a lookup-per-call approach, everything is parsed once into [`Config`]
//! at startup so a missing credential fails fast instead of in the middle of a
//! request.

use std::{env, path::PathBuf, str::FromStr};

use thiserror::Error;

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:3000/callback";
pub const DEFAULT_SCOPES: &str = "user-top-read playlist-modify-private playlist-modify-public";
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_POST_LOGIN_REDIRECT: &str = "/recommendations";
pub const DEFAULT_MAX_REFRESH_FAILURES: u32 = 3;
pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Which OAuth 2.0 grant the process serves.
///
/// The two flows are mutually exclusive: the authorization-code flow mounts
/// `/login` and `/callback`, the client-credentials flow mounts `/spotify/token`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantFlow {
    AuthorizationCode,
    ClientCredentials,
}

impl FromStr for GrantFlow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "authorization_code" | "code" => Ok(GrantFlow::AuthorizationCode),
            "client_credentials" => Ok(GrantFlow::ClientCredentials),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub show_dialog: bool,
    pub accounts_url: String,
    pub api_url: String,
    pub grant_flow: GrantFlow,
    /// Where `/callback` redirects after a successful login. `None` renders an
    /// inline success page instead.
    pub post_login_redirect: Option<String>,
    pub model_service_url: Option<String>,
    pub max_refresh_failures: u32,
    pub server_address: String,
    pub port: u16,
}

impl Config {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when the client credentials are absent
    /// and [`ConfigError::Invalid`] when a value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset, except for `POST_LOGIN_REDIRECT`
    /// where an empty value selects the inline success page.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let client_id = get("SPOTIFY_CLIENT_ID").ok_or(ConfigError::Missing("SPOTIFY_CLIENT_ID"))?;
        let client_secret =
            get("SPOTIFY_CLIENT_SECRET").ok_or(ConfigError::Missing("SPOTIFY_CLIENT_SECRET"))?;

        let scopes = get("SPOTIFY_SCOPES")
            .unwrap_or_else(|| DEFAULT_SCOPES.to_string())
            .split(|c: char| c == ' ' || c == ',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let show_dialog = match get("SPOTIFY_SHOW_DIALOG") {
            Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid {
                key: "SPOTIFY_SHOW_DIALOG",
                value: v,
            })?,
            None => true,
        };

        let grant_flow = match get("SPOTIFY_GRANT_FLOW") {
            Some(v) => v.parse().map_err(|value| ConfigError::Invalid {
                key: "SPOTIFY_GRANT_FLOW",
                value,
            })?,
            None => GrantFlow::AuthorizationCode,
        };

        let post_login_redirect = match lookup("POST_LOGIN_REDIRECT") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(v),
            None => Some(DEFAULT_POST_LOGIN_REDIRECT.to_string()),
        };

        let max_refresh_failures = match get("MAX_REFRESH_FAILURES") {
            Some(v) => match v.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "MAX_REFRESH_FAILURES",
                        value: v,
                    });
                }
            },
            None => DEFAULT_MAX_REFRESH_FAILURES,
        };

        let port = match get("PORT") {
            Some(v) => v.parse::<u16>().map_err(|_| ConfigError::Invalid { key: "PORT", value: v })?,
            None => DEFAULT_PORT,
        };

        Ok(Config {
            client_id,
            client_secret,
            redirect_uri: get("SPOTIFY_REDIRECT_URI")
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            scopes,
            show_dialog,
            accounts_url: trim_url(
                get("SPOTIFY_ACCOUNTS_URL").unwrap_or_else(|| DEFAULT_ACCOUNTS_URL.to_string()),
            ),
            api_url: trim_url(get("SPOTIFY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string())),
            grant_flow,
            post_login_redirect,
            model_service_url: get("MODEL_SERVICE_URL").map(trim_url),
            max_refresh_failures,
            server_address: get("SERVER_ADDRESS")
                .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string()),
            port,
        })
    }

    /// The `host:port` pair the HTTP server binds to.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_address, self.port)
    }
}

/// Loads environment variables from `.env` files.
///
/// The working directory is tried first, then `spotrec/.env` inside the
/// platform config directory:
/// - Linux: `~/.config/spotrec/.env`
/// - macOS: `~/Library/Application Support/spotrec/.env`
/// - Windows: `%APPDATA%/spotrec/.env`
///
/// Variables that are already set are never overwritten. Missing files are not
/// an error; a file that exists but cannot be parsed is.
pub fn load_env() -> Result<(), String> {
    match dotenv::dotenv() {
        Ok(_) => {}
        Err(e) if e.not_found() => {}
        Err(e) => return Err(e.to_string()),
    }

    let path = env_file_path();
    if path.exists() {
        dotenv::from_path(&path).map_err(|e| e.to_string())?;
    }

    Ok(())
}

fn env_file_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("spotrec/.env");
    path
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
