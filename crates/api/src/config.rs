use std::path::PathBuf;
use std::str::FromStr;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Which ODA backend the server opens units of work against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdaBackendType {
    Postgres,
    Memory,
}

impl FromStr for OdaBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" | "filesystem" => Ok(Self::Memory),
            other => Err(format!("unknown backend '{other}', expected postgres or memory")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. In a deployment,
/// override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    /// A single `*` mirrors the request origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Kubernetes namespace the API prefix is built from.
    pub kube_namespace: String,
    /// Major version in the API prefix (`/v1`).
    pub api_major_version: String,
    /// Hide internal error details from clients.
    pub production: bool,
    pub oda_backend: OdaBackendType,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Seed directory for the memory backend.
    pub oda_data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            cors_origins: vec!["*".into()],
            request_timeout_secs: 30,
            kube_namespace: "ska-oso-ptt-services".into(),
            api_major_version: env!("CARGO_PKG_VERSION_MAJOR").into(),
            production: false,
            oda_backend: OdaBackendType::Postgres,
            database_url: "postgresql://postgres@localhost:5432/postgres".into(),
            db_max_connections: 20,
            oda_data_dir: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                              |
    /// |--------------------------|--------------------------------------|
    /// | `HOST`                   | `0.0.0.0`                            |
    /// | `PORT`                   | `3000`                               |
    /// | `CORS_ORIGINS`           | `*`                                  |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                                 |
    /// | `KUBE_NAMESPACE`         | `ska-oso-ptt-services`               |
    /// | `PTT_MAJOR_VERSION`      | crate major version                  |
    /// | `PRODUCTION`             | `false`                              |
    /// | `ODA_BACKEND_TYPE`       | `postgres`                           |
    /// | `DATABASE_URL`           | built from the `POSTGRES_*` vars     |
    /// | `DB_MAX_CONNECTIONS`     | `20`                                 |
    /// | `ODA_DATA_DIR`           | unset                                |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => postgres_url_from_parts(),
        };

        Ok(Self {
            host: env_or("HOST", &defaults.host),
            port: parse_env("PORT", defaults.port)?,
            cors_origins,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            kube_namespace: env_or("KUBE_NAMESPACE", &defaults.kube_namespace),
            api_major_version: env_or("PTT_MAJOR_VERSION", &defaults.api_major_version),
            production: env_or("PRODUCTION", "false").trim().eq_ignore_ascii_case("true"),
            oda_backend: parse_env("ODA_BACKEND_TYPE", defaults.oda_backend)?,
            database_url,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            oda_data_dir: std::env::var("ODA_DATA_DIR")
                .ok()
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Prefix every API route is nested under, e.g.
    /// `/ska-oso-ptt-services/ptt/api/v1`.
    pub fn api_prefix(&self) -> String {
        format!(
            "/{}/ptt/api/v{}",
            self.kube_namespace, self.api_major_version
        )
    }
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::Invalid {
                var,
                value,
                reason: e.to_string(),
            })
        }
        Err(_) => Ok(default),
    }
}

fn postgres_url_from_parts() -> String {
    let host = env_or("POSTGRES_HOST", "localhost");
    let port = env_or("POSTGRES_PORT", "5432");
    let db = env_or("POSTGRES_DB_NAME", "postgres");
    let user = env_or("ADMIN_POSTGRES_USER", "postgres");
    match std::env::var("ADMIN_POSTGRES_PASSWORD") {
        Ok(password) if !password.is_empty() => {
            format!("postgresql://{user}:{password}@{host}:{port}/{db}")
        }
        _ => format!("postgresql://{user}@{host}:{port}/{db}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_prefix_uses_namespace_and_major_version() {
        let config = ServerConfig {
            kube_namespace: "staging".into(),
            api_major_version: "2".into(),
            ..ServerConfig::default()
        };
        assert_eq!(config.api_prefix(), "/staging/ptt/api/v2");
    }

    #[test]
    fn backend_type_parses_known_names() {
        assert_eq!("Postgres".parse::<OdaBackendType>(), Ok(OdaBackendType::Postgres));
        assert_eq!("memory".parse::<OdaBackendType>(), Ok(OdaBackendType::Memory));
        assert!("sqlite".parse::<OdaBackendType>().is_err());
    }
}
