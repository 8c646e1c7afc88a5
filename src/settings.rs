use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct TemplateSettings {
    pub dir: String,
}

/// Where uploaded school images live. Files land under
/// `<root>/schoolimage/` and are served back as `/schoolimage/<name>`.
#[derive(Clone, Debug)]
pub struct MediaSettings {
    pub root: PathBuf,
}

#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    /// Full connection URL; takes precedence over the host/port/user parts.
    /// This is how tests and local development point at SQLite.
    pub url_override: Option<String>,
}

impl DatabaseSettings {
    pub fn url(&self) -> String {
        if let Some(url) = &self.url_override {
            return url.clone();
        }
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub debug: bool,
    pub host: String,
    pub port: u16,
    /// Optional absolute base URL prefixed to the API calls made by the
    /// pages, for setups where the browser reaches the server through
    /// another host.
    pub base_url: Option<String>,
    pub database: DatabaseSettings,
    pub media: MediaSettings,
    pub template: TemplateSettings,
}

impl Settings {
    /// Load settings from the environment, falling back to local defaults.
    pub fn from_env() -> Self {
        Settings {
            debug: env::var("DEBUG")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            host: var_or("HOST", "127.0.0.1"),
            port: parsed_var_or("PORT", 3000),
            base_url: env::var("PUBLIC_BASE_URL").ok().filter(|v| !v.is_empty()),
            database: DatabaseSettings {
                host: var_or("DB_HOST", "127.0.0.1"),
                port: parsed_var_or("DB_PORT", 3306),
                name: var_or("DB_NAME", "schoolbook"),
                user: var_or("DB_USER", "schoolbook"),
                password: var_or("DB_PASSWORD", ""),
                url_override: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            },
            media: MediaSettings {
                root: PathBuf::from(var_or("MEDIA_ROOT", "public")),
            },
            template: TemplateSettings {
                dir: var_or("TEMPLATE_DIR", "templates"),
            },
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_var_or(key: &str, default: u16) -> u16 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
