use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::Parser;
use rand::RngCore;
use thiserror::Error;

pub const COOKIE_KEY_BYTES: usize = 16;

#[derive(Debug, Parser)]
#[command(name = "ballot-studio", version, about = "Election ballot studio server")]
pub struct StudioArgs {
    /// Interface:port to listen on.
    #[arg(long = "http", env = "STUDIO_HTTP", default_value = ":8180")]
    pub http: String,

    /// Path to a SQLite database file.
    #[arg(long, env = "STUDIO_SQLITE")]
    pub sqlite: Option<PathBuf>,

    /// PostgreSQL connection string.
    #[arg(long, env = "STUDIO_POSTGRES")]
    pub postgres: Option<String>,

    /// URL of the ballot draw service.
    #[arg(long = "draw-backend", env = "STUDIO_DRAW_BACKEND")]
    pub draw_backend: Option<String>,

    /// Directory scanned ballot images are archived under.
    #[arg(long = "im-archive-dir", env = "STUDIO_IM_ARCHIVE_DIR")]
    pub im_archive_dir: Option<PathBuf>,

    /// Base64 of 16 bytes used to sign session cookies.
    #[arg(long = "cookie-key", env = "STUDIO_COOKIE_KEY")]
    pub cookie_key: Option<String>,

    /// File to write the process id to.
    #[arg(long, env = "STUDIO_PID")]
    pub pid: Option<PathBuf>,

    /// Upper bound on cached render output.
    #[arg(long = "cache-bytes", env = "STUDIO_CACHE_BYTES", default_value_t = 64 * 1024 * 1024)]
    pub cache_bytes: usize,

    /// pdftoppm binary used for PNG previews.
    #[arg(long, env = "STUDIO_PDFTOPPM", default_value = "pdftoppm")]
    pub pdftoppm: PathBuf,

    /// Resolution of PNG previews, in dots per inch.
    #[arg(long = "png-dpi", env = "STUDIO_PNG_DPI", default_value_t = 100)]
    pub png_dpi: u32,

    #[arg(long = "invite-gc-minutes", env = "STUDIO_INVITE_GC_MINUTES", default_value_t = 57)]
    pub invite_gc_minutes: u64,

    #[arg(long = "db-max-connections", env = "STUDIO_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub db_max_connections: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("only one of --sqlite and --postgres may be given")]
    ConflictingStorage,
    #[error("cookie key is not valid base64: {0}")]
    CookieKeyEncoding(#[from] base64::DecodeError),
    #[error("cookie key must be 16 bytes, got {0}")]
    CookieKeyLength(usize),
    #[error("invite gc interval must be at least one minute")]
    ZeroGcInterval,
    #[error("png resolution must be at least 1 dpi")]
    ZeroPngResolution,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageSelection {
    Sqlite(PathBuf),
    Postgres(String),
    InMemory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieKey {
    Provided(Vec<u8>),
    /// Fresh random key; sessions do not survive a restart.
    Generated(Vec<u8>),
}

impl CookieKey {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Provided(bytes) | Self::Generated(bytes) => bytes,
        }
    }

    pub fn encoded(&self) -> String {
        STANDARD.encode(self.bytes())
    }

    fn resolve(raw: Option<&str>) -> Result<Self, ConfigError> {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            let mut key = vec![0u8; COOKIE_KEY_BYTES];
            rand::thread_rng().fill_bytes(&mut key);
            return Ok(Self::Generated(key));
        };

        let key = STANDARD.decode(raw)?;
        if key.len() != COOKIE_KEY_BYTES {
            return Err(ConfigError::CookieKeyLength(key.len()));
        }
        Ok(Self::Provided(key))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http: String,
    pub storage: StorageSelection,
    pub draw_backend: Option<String>,
    pub im_archive_dir: Option<PathBuf>,
    pub cookie_key: CookieKey,
    pub pid_path: Option<PathBuf>,
    pub cache_bytes: usize,
    pub pdftoppm: PathBuf,
    pub png_dpi: u32,
    pub invite_gc_interval: Duration,
    pub db_max_connections: u32,
}

impl AppConfig {
    pub fn from_args(args: StudioArgs) -> Result<Self, ConfigError> {
        let storage = match (args.sqlite, args.postgres) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingStorage),
            (Some(path), None) => StorageSelection::Sqlite(path),
            (None, Some(url)) => StorageSelection::Postgres(url),
            (None, None) => StorageSelection::InMemory,
        };

        if args.invite_gc_minutes == 0 {
            return Err(ConfigError::ZeroGcInterval);
        }
        if args.png_dpi == 0 {
            return Err(ConfigError::ZeroPngResolution);
        }

        Ok(Self {
            http: args.http,
            storage,
            draw_backend: args.draw_backend,
            im_archive_dir: args.im_archive_dir,
            cookie_key: CookieKey::resolve(args.cookie_key.as_deref())?,
            pid_path: args.pid,
            cache_bytes: args.cache_bytes,
            pdftoppm: args.pdftoppm,
            png_dpi: args.png_dpi,
            invite_gc_interval: Duration::from_secs(args.invite_gc_minutes * 60),
            db_max_connections: args.db_max_connections,
        })
    }

    /// Bindable socket address; a bare `:port` listens on every interface.
    pub fn listen_address(&self) -> String {
        if self.http.starts_with(':') {
            format!("0.0.0.0{}", self.http)
        } else {
            self.http.clone()
        }
    }

    /// Port part of the listen address, used in the logged signup URL.
    pub fn listen_port(&self) -> Option<u16> {
        self.http.rsplit_once(':')?.1.parse().ok()
    }
}
