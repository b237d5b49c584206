use std::{path::PathBuf, str::FromStr, time};

use url::Url;

use crate::ClientError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 4;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const DEFAULT_HOME_PATH: &str = "home";

/// Wrapper over env::var to return an invalid enviroment var error
fn env_check(s: &str) -> Result<String, ClientError> {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ClientError::Config(format!("{s} was not set"))),
    }
}

/// Optional variable; blank counts as unset
fn env_opt(s: &str) -> Option<String> {
    std::env::var(s).ok().filter(|v| !v.trim().is_empty())
}

fn env_or<T: FromStr>(s: &str, default: T) -> T {
    env_opt(s).and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

/// Ensures that url is https, plain http is only accepted on loopback
fn ensure_https(url: &Url) -> Result<(), String> {
    let loopback = matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    );
    match url.scheme() {
        "https" => Ok(()),
        "http" if loopback => Ok(()),
        _ => Err(format!("URL must be https: {url}"))
    }
}

fn ensure_host(url: &Url) -> Result<(), String> {
    match url.host_str() {
        Some(h) if !h.is_empty() => Ok(()),
        _ => Err(format!("URL missing host: {url}"))
    }
}

///
/// Configuration for the music subscription API
///
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,   // https://<api-id>.execute-api.<region>.amazonaws.com/<stage>/
    pub home_url: Url,   // base_url joined with the home path
}

impl ApiConfig {
    pub fn new(base: &str, home_path: &str) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base.trim())
            .map_err(|e| ClientError::Config(
                format!("MUSIC_API_BASE invalid {e}")
            ))?;

        ensure_https(&base_url).map_err(ClientError::Config)?;
        ensure_host(&base_url).map_err(ClientError::Config)?;

        // ensure trailing slash
        if !base_url.path().ends_with('/') {
            let mut path = base_url.path().to_string();
            path.push('/');
            base_url.set_path(&path);
        }

        let home_url = base_url.join(home_path.trim_start_matches('/'))
            .map_err(|e| ClientError::Config(
                format!("MUSIC_API_HOME_PATH invalid {e}")
            ))?;

        Ok( Self { base_url, home_url } )
    }
}

fn build_api(base_override: Option<&str>) -> Result<ApiConfig, ClientError> {
    let base = match base_override {
        Some(b) => b.to_string(),
        None => env_check("MUSIC_API_BASE")?
    };
    let home_path = env_opt("MUSIC_API_HOME_PATH")
        .unwrap_or_else(|| DEFAULT_HOME_PATH.to_string());

    ApiConfig::new(&base, &home_path)
}

///
/// Configuration for Http timeouts, pool, etc.
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS
        }
    }
}

fn build_http() -> HttpConfig {
    let mut http = HttpConfig::default();
    http.timeout = time::Duration::from_millis(env_or("HTTP_TIMEOUT_MS", HTTP_TIMEOUT));
    http.connect_timeout = time::Duration::from_millis(
        env_or("HTTP_CONNECT_TIMEOUT_MS", HTTP_CONNECT_TIMEOUT)
    );
    http
}

///
/// Configuration for Logger
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

impl FromStr for LogFormat {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ClientError::Config(format!("unknown LOG_FORMAT {other}")))
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool,
    pub log_dir: Option<PathBuf>   // None writes to stderr
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "warn,tune_sub=info,reqwest=warn".to_string(),
            format: LogFormat::Pretty,
            with_ansi: true,
            include_file_line: false,
            include_target: true,
            log_dir: None
        }
    }
}

fn build_logging() -> Result<LoggingConfig, ClientError> {
    let mut logging = LoggingConfig::default();
    if let Some(format) = env_opt("LOG_FORMAT") {
        logging.format = format.parse()?;
    }
    if let Some(dir) = env_opt("LOG_DIR") {
        logging.log_dir = Some(PathBuf::from(dir));
        logging.with_ansi = false;
    }
    logging.include_file_line = logging.format == LogFormat::Json;
    Ok(logging)
}

///
/// AppConfig which holds everything the session and fetch module need
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
/// `base_override` comes from the command line and wins over MUSIC_API_BASE.
///
pub fn load_config(base_override: Option<&str>) -> Result<AppConfig, ClientError> {
    dotenvy::dotenv().ok();

    let api     = build_api(base_override)?;
    let http    = build_http();
    let logging = build_logging()?;

    Ok( AppConfig { api, http, logging } )
}
