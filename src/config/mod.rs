use std::env;
use std::path::PathBuf;

/// Runtime configuration for the site backend
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Database connection URL (MySQL in production, SQLite for local runs)
    pub database_url: String,

    /// JWT signing secret (HS256)
    pub jwt_secret: String,

    /// Lifetime of issued admin tokens in hours (default: 72)
    pub jwt_expiry_hours: i64,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,

    /// Maximum size of a single uploaded image in bytes (default: 5 MiB)
    pub max_upload_size: usize,

    /// Root directory of the asset store, served under `/Uploads`
    pub upload_dir: PathBuf,

    /// Listen port (default: 5000)
    pub port: u16,

    /// Seed credentials used when the admin table is empty
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,

    /// Delete attempts for a retired asset before giving up (default: 3)
    pub cleanup_max_attempts: u32,

    /// Minimum age of an unreferenced file before the sweep removes it (default: 24)
    pub orphan_grace_hours: u64,

    /// Period between orphan sweeps in seconds (default: 3600)
    pub orphan_sweep_interval_secs: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            database_url: "mysql://root:@localhost:3306/astro_site".to_string(),
            jwt_secret: "secret".to_string(),
            jwt_expiry_hours: 72,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            max_upload_size: 5 * 1024 * 1024, // 5 MiB
            upload_dir: PathBuf::from("Uploads"),
            port: 5000,
            admin_username: None,
            admin_password: None,
            cleanup_max_attempts: 3,
            orphan_grace_hours: 24,
            orphan_sweep_interval_secs: 3600,
        }
    }
}

impl SiteConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            database_url: env::var("DATABASE_URL")
                .ok()
                .or_else(database_url_from_parts)
                .unwrap_or(default.database_url),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.jwt_expiry_hours),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_origins),

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),

            cleanup_max_attempts: env::var("CLEANUP_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.cleanup_max_attempts),

            orphan_grace_hours: env::var("ORPHAN_GRACE_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.orphan_grace_hours),

            orphan_sweep_interval_secs: env::var("ORPHAN_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.orphan_sweep_interval_secs),
        }
    }

    /// Create config for local development and tests (SQLite, relaxed secret)
    pub fn development() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "development_secret".to_string(),
            cleanup_max_attempts: 1,
            ..Self::default()
        }
    }

    /// Request body cap: enough for every image slot of the widest form plus multipart overhead
    pub fn max_body_size(&self) -> usize {
        self.max_upload_size * 8 + 1024 * 1024
    }
}

fn database_url_from_parts() -> Option<String> {
    let host = env::var("DB_HOST").ok()?;
    let name = env::var("DB_NAME").ok()?;
    let user = env::var("DB_USER").unwrap_or_else(|_| "root".to_string());
    let password = env::var("DB_PASSWORD").unwrap_or_default();
    let port = env::var("DB_PORT").unwrap_or_else(|_| "3306".to_string());

    Some(format!("mysql://{}:{}@{}:{}/{}", user, password, host, port, name))
}
