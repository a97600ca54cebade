/// Configuration management for the API server
///
/// Configuration comes from environment variables (a `.env` file is loaded
/// first when present) and is parsed into a type-safe struct once at startup.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `API_HOST` / `API_PORT` (or `PORT`): bind address (default: 0.0.0.0:8080)
/// - `PRODUCTION`: enables HSTS and hides internal error details
/// - `CORS_ORIGINS`: comma-separated origins, `*` for permissive (default: `*`)
/// - `AUTH_PROVIDER`: `local` or `firebase` (default: local)
/// - `JWT_SECRET`: token signing key, at least 32 characters (local auth)
/// - `FIREBASE_PROJECT_ID`: project whose ID tokens are accepted (firebase auth)
/// - `IDENTITY_TIMEOUT_SECS`: bound on one identity verification (default: 10)
/// - `STORAGE_BACKEND`: `local` or `cloudinary` (default: local)
/// - `UPLOAD_DIR`: directory for local uploads (default: ./uploads)
/// - `CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_API_KEY`, `CLOUDINARY_API_SECRET`
/// - `MAX_FILE_SIZE`: per-file ceiling in bytes (default: 5 MiB)
/// - `MAX_FILES_PER_TASK`: attachments per submission (default: 5)
/// - `UPLOAD_TIMEOUT_SECS`: bound on one storage call (default: 30)
///
/// # Example
///
/// ```no_run
/// use dailytask_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use dailytask_shared::storage::{CloudinaryConfig, UploadPolicy};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Production mode: HSTS on, error details off
    pub production: bool,

    /// Allowed CORS origins; `*` means permissive
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Which credential the authentication gate accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthProviderConfig {
    /// HS256 tokens issued by this server
    Local { jwt_secret: String },

    /// Firebase ID tokens
    Firebase { project_id: String },
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub provider: AuthProviderConfig,

    /// Upper bound on one external identity verification
    pub identity_timeout: Duration,
}

#[derive(Debug, Clone)]
pub enum StorageBackendConfig {
    Local { upload_dir: PathBuf },
    Cloudinary(CloudinaryConfig),
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackendConfig,
    pub max_file_size: usize,
    pub max_files_per_task: usize,
    pub upload_timeout: Duration,
}

impl StorageConfig {
    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_file_size: self.max_file_size,
            max_files: self.max_files_per_task,
            store_timeout: self.upload_timeout,
        }
    }

    /// Request body ceiling for a submission: every file at full size plus
    /// room for the text fields and multipart framing
    pub fn body_limit(&self) -> usize {
        self.max_file_size
            .saturating_mul(self.max_files_per_task)
            .saturating_add(1024 * 1024)
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", name))
}

fn parse_var<T>(name: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var_or(name, default);
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, raw, e))
}

fn parse_bool(name: &str) -> bool {
    matches!(
        env::var(name).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Ok("1" | "true" | "yes")
    )
}

/// Splits a comma-separated origin list, dropping blanks
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable for the selected auth provider
    /// or storage backend is missing, or if a numeric variable does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let port_default = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
        let api = ApiConfig {
            host: var_or("API_HOST", "0.0.0.0"),
            port: parse_var("API_PORT", &port_default)?,
            production: parse_bool("PRODUCTION"),
            cors_origins: parse_origins(&var_or("CORS_ORIGINS", "*")),
        };

        let database = DatabaseConfig {
            url: required("DATABASE_URL")?,
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", "10")?,
        };

        let provider = match var_or("AUTH_PROVIDER", "local").trim().to_ascii_lowercase().as_str() {
            "local" => {
                let jwt_secret = required("JWT_SECRET")?;
                if jwt_secret.len() < 32 {
                    anyhow::bail!("JWT_SECRET must be at least 32 characters long");
                }
                AuthProviderConfig::Local { jwt_secret }
            }
            "firebase" => AuthProviderConfig::Firebase {
                project_id: required("FIREBASE_PROJECT_ID")?,
            },
            other => anyhow::bail!("AUTH_PROVIDER must be 'local' or 'firebase', got '{}'", other),
        };

        let auth = AuthConfig {
            provider,
            identity_timeout: Duration::from_secs(parse_var("IDENTITY_TIMEOUT_SECS", "10")?),
        };

        let backend = match var_or("STORAGE_BACKEND", "local").trim().to_ascii_lowercase().as_str() {
            "local" => StorageBackendConfig::Local {
                upload_dir: PathBuf::from(var_or("UPLOAD_DIR", "./uploads")),
            },
            "cloudinary" => StorageBackendConfig::Cloudinary(CloudinaryConfig {
                cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
                api_key: required("CLOUDINARY_API_KEY")?,
                api_secret: required("CLOUDINARY_API_SECRET")?,
            }),
            other => anyhow::bail!(
                "STORAGE_BACKEND must be 'local' or 'cloudinary', got '{}'",
                other
            ),
        };

        let storage = StorageConfig {
            backend,
            max_file_size: parse_var("MAX_FILE_SIZE", "5242880")?,
            max_files_per_task: parse_var("MAX_FILES_PER_TASK", "5")?,
            upload_timeout: Duration::from_secs(parse_var("UPLOAD_TIMEOUT_SECS", "30")?),
        };

        if storage.max_file_size == 0 || storage.max_files_per_task == 0 {
            anyhow::bail!("MAX_FILE_SIZE and MAX_FILES_PER_TASK must be positive");
        }

        Ok(Self {
            api,
            database,
            auth,
            storage,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Signing secret when local auth is configured
    pub fn jwt_secret(&self) -> Option<&str> {
        match &self.auth.provider {
            AuthProviderConfig::Local { jwt_secret } => Some(jwt_secret),
            AuthProviderConfig::Firebase { .. } => None,
        }
    }

    /// Permissive CORS is on when the origin list contains `*`
    pub fn cors_permissive(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}
