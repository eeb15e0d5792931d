use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, ToSmolStr};
use url::Url;

use crate::error::ConfigError;

/// Credentials needed to read one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub database_id: String,
    pub token: String,
}

/// A named pairing of a database and the integration token allowed to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub name: SmolStr,
    pub database_id: String,
    pub token: String,
}

impl Association {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            database_id: self.database_id.clone(),
            token: self.token.clone(),
        }
    }
}

/// Looks up credentials by association name.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Credentials, ConfigError>;
}

impl CredentialResolver for [Association] {
    fn resolve(&self, name: &str) -> Result<Credentials, ConfigError> {
        self.iter()
            .find(|a| a.name == name)
            .map(Association::credentials)
            .ok_or_else(|| ConfigError::MissingAssociation {
                name: name.to_string(),
            })
    }
}

impl CredentialResolver for Vec<Association> {
    fn resolve(&self, name: &str) -> Result<Credentials, ConfigError> {
        self.as_slice().resolve(name)
    }
}

/// Parse a space separated `name=value` list, e.g. `"posts=secret_a authors=secret_b"`.
///
/// Entries without `=` or with an empty side are skipped.
pub fn compile_associations(input: &str) -> Vec<(SmolStr, String)> {
    input
        .split_whitespace()
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let (name, value) = (name.trim(), value.trim());
            (!name.is_empty() && !value.is_empty()).then(|| (name.to_smolstr(), value.to_string()))
        })
        .collect()
}

/// Merge `name=token` pairs into a set of associations.
///
/// A pair naming an existing association replaces its token. Unknown names
/// become new associations whose database id is the name itself.
pub fn merge_associations(
    mut associations: Vec<Association>,
    pairs: impl IntoIterator<Item = (SmolStr, String)>,
) -> Vec<Association> {
    for (name, token) in pairs {
        match associations.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.token = token,
            None => associations.push(Association {
                database_id: name.to_string(),
                name,
                token,
            }),
        }
    }
    associations
}

/// Remote content source configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    pub base_url: Url,
    pub api_version: String,
    /// Allowed request budget. Drives the rate-limit backoff interval.
    pub calls_per_second: u32,
}

impl RemoteConfig {
    pub const DEFAULT_URL: &'static str = "https://api.notion.com/v1";
    pub const DEFAULT_API_VERSION: &'static str = "2022-06-28";
    pub const DEFAULT_CALLS_PER_SECOND: u32 = 3;

    /// Load configuration from environment variables.
    ///
    /// Optional env vars:
    /// - `MOTIONLINK_API_URL`: API base URL (default: https://api.notion.com/v1)
    /// - `MOTIONLINK_API_VERSION`: value of the version header (default: 2022-06-28)
    /// - `MOTIONLINK_CALLS_PER_SECOND`: request budget (default: 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`RemoteConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url_str =
            lookup("MOTIONLINK_API_URL").unwrap_or_else(|| Self::DEFAULT_URL.to_string());
        let base_url = parse_base_url(&url_str)?;

        let api_version = lookup("MOTIONLINK_API_VERSION")
            .unwrap_or_else(|| Self::DEFAULT_API_VERSION.to_string());

        let calls_per_second = match lookup("MOTIONLINK_CALLS_PER_SECOND") {
            Some(value) => match value.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "MOTIONLINK_CALLS_PER_SECOND",
                        value,
                    });
                }
            },
            None => Self::DEFAULT_CALLS_PER_SECOND,
        };

        Ok(Self {
            base_url,
            api_version,
            calls_per_second,
        })
    }

    /// Endpoint URL for a path relative to the API root.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path.trim_start_matches('/'))
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: parse_base_url(Self::DEFAULT_URL).expect("default API url parses"),
            api_version: Self::DEFAULT_API_VERSION.to_string(),
            calls_per_second: Self::DEFAULT_CALLS_PER_SECOND,
        }
    }
}

/// Parse a base URL, forcing a trailing slash so relative joins append.
pub fn parse_base_url(url_str: &str) -> Result<Url, ConfigError> {
    let normalized = if url_str.ends_with('/') {
        url_str.to_string()
    } else {
        format!("{url_str}/")
    };
    Url::parse(&normalized).map_err(|e| ConfigError::UrlParse {
        url: url_str.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assoc(name: &str, db: &str, token: &str) -> Association {
        Association {
            name: name.into(),
            database_id: db.into(),
            token: token.into(),
        }
    }

    #[test]
    fn test_resolve_known_association() {
        let associations = vec![assoc("posts", "db-1", "secret")];
        let creds = associations.resolve("posts").unwrap();
        assert_eq!(creds.database_id, "db-1");
        assert_eq!(creds.token, "secret");
    }

    #[test]
    fn test_resolve_missing_association() {
        let associations = vec![assoc("posts", "db-1", "secret")];
        match associations.resolve("authors") {
            Err(ConfigError::MissingAssociation { name }) => assert_eq!(name, "authors"),
            other => panic!("expected missing association, got {other:?}"),
        }
    }

    #[test]
    fn test_compile_associations() {
        let pairs = compile_associations("  posts=abc   authors=def broken =x y= ");
        assert_eq!(
            pairs,
            vec![
                (SmolStr::new("posts"), "abc".to_string()),
                (SmolStr::new("authors"), "def".to_string()),
            ]
        );
        assert!(compile_associations("").is_empty());
    }

    #[test]
    fn test_merge_overrides_token() {
        let merged = merge_associations(
            vec![assoc("posts", "db-1", "old")],
            compile_associations("posts=new db-2=tok"),
        );
        assert_eq!(merged[0], assoc("posts", "db-1", "new"));
        assert_eq!(merged[1], assoc("db-2", "db-2", "tok"));
    }

    #[test]
    fn test_endpoint_keeps_version_segment() {
        let config = RemoteConfig::default();
        let url = config.endpoint("/databases/abc/query").unwrap();
        assert_eq!(url.as_str(), "https://api.notion.com/v1/databases/abc/query");
    }

    #[test]
    fn test_unset_variables_use_defaults() {
        let config = RemoteConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, RemoteConfig::default());
    }

    #[test]
    fn test_variables_override_defaults() {
        let config = RemoteConfig::from_lookup(|var| match var {
            "MOTIONLINK_API_URL" => Some("http://localhost:8080/v1".into()),
            "MOTIONLINK_CALLS_PER_SECOND" => Some("10".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.base_url.as_str(), "http://localhost:8080/v1/");
        assert_eq!(config.api_version, RemoteConfig::DEFAULT_API_VERSION);
        assert_eq!(config.calls_per_second, 10);
    }

    #[test]
    fn test_bad_call_budget_is_invalid_value() {
        for bad in ["0", "fast"] {
            let err = RemoteConfig::from_lookup(|var| {
                (var == "MOTIONLINK_CALLS_PER_SECOND").then(|| bad.to_string())
            })
            .unwrap_err();
            let ConfigError::InvalidValue { var, value } = &err else {
                panic!("expected an invalid value error, got {err:?}");
            };
            assert_eq!(*var, "MOTIONLINK_CALLS_PER_SECOND");
            assert_eq!(value, bad);
        }
    }

    #[test]
    fn test_parse_base_url_rejects_garbage() {
        assert!(matches!(
            parse_base_url("not a url"),
            Err(ConfigError::UrlParse { .. })
        ));
    }
}
