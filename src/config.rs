use serde::Deserialize;

/// Upper bound for `JWT_TTL_MINUTES` (one year).
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Credentials for the superuser created at startup, if configured.
#[derive(Debug, Clone, Deserialize)]
pub struct SuperuserSeed {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    /// When false, `GET /users/:id` is open to anonymous callers.
    pub require_auth_for_reads: bool,
    pub superuser: Option<SuperuserSeed>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let db_max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "users-service".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "users-service-clients".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .map(|v| v.clamp(1, MAX_TTL_MINUTES))
                .unwrap_or(60),
        };
        let require_auth_for_reads = std::env::var("REQUIRE_AUTH_FOR_READS")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        let superuser = match (
            std::env::var("SUPERUSER_USERNAME"),
            std::env::var("SUPERUSER_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some(SuperuserSeed { username, password }),
            _ => None,
        };
        Ok(Self {
            database_url,
            db_max_connections,
            jwt,
            require_auth_for_reads,
            superuser,
        })
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::parse_flag;

    #[test]
    fn parse_flag_accepts_common_truthy_values() {
        for v in ["1", "true", "TRUE", " yes ", "on"] {
            assert!(parse_flag(v), "{v} should be truthy");
        }
        for v in ["0", "false", "", "nope"] {
            assert!(!parse_flag(v), "{v} should be falsy");
        }
    }
}
