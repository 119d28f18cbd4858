use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info, warn};

const NETSCAPE_HEADERS: [&str; 2] = ["# Netscape HTTP Cookie File", "# HTTP Cookie File"];

#[derive(Error, Debug, Clone)]
pub enum CookieError {
    #[error("YOUTUBE_COOKIES_B64 is not valid base64: {0}")]
    Decode(String),
    #[error("decoded cookies are empty")]
    Empty,
    #[error("failed to write cookie file {path}: {reason}")]
    Write { path: String, reason: String },
}

/// Cookie file materialized from `YOUTUBE_COOKIES_B64`. Decoding and writing
/// happen on first use only; later calls reuse the outcome.
pub struct CookieJar {
    encoded: Option<String>,
    path: PathBuf,
    loaded: OnceLock<Result<PathBuf, CookieError>>,
}

/// Snapshot of the cookie setup, served by `GET /debug`.
#[derive(Serialize, Debug)]
pub struct CookieReport {
    pub env_present: bool,
    pub env_length: usize,
    pub cookie_file: Option<String>,
    pub file_exists: bool,
    pub file_size: Option<u64>,
    pub cookie_lines: usize,
    pub netscape_header: bool,
    pub error: Option<String>,
}

impl CookieJar {
    pub fn new(encoded: Option<String>, path: PathBuf) -> Self {
        Self {
            encoded: encoded.filter(|v| !v.trim().is_empty()),
            path,
            loaded: OnceLock::new(),
        }
    }

    /// Path to hand to yt-dlp, or `None` when no usable cookies exist.
    pub fn cookie_file(&self) -> Option<&Path> {
        self.load().as_ref().ok().map(PathBuf::as_path)
    }

    fn load(&self) -> &Result<PathBuf, CookieError> {
        self.loaded.get_or_init(|| {
            let result = match self.encoded.as_deref() {
                Some(encoded) => write_cookie_file(encoded, &self.path),
                None => Err(CookieError::Empty),
            };
            match (&result, self.encoded.is_some()) {
                (Ok(path), _) => info!("Cookies loaded into {}", path.display()),
                (Err(e), true) => warn!("Cookies unavailable, extracting without them: {e}"),
                (Err(_), false) => debug!("YOUTUBE_COOKIES_B64 not set, extracting without cookies"),
            }
            result
        })
    }

    pub fn report(&self) -> CookieReport {
        let outcome = self.load();
        let env_present = self.encoded.is_some();
        let env_length = self.encoded.as_deref().map(str::len).unwrap_or(0);

        let mut report = CookieReport {
            env_present,
            env_length,
            cookie_file: None,
            file_exists: false,
            file_size: None,
            cookie_lines: 0,
            netscape_header: false,
            error: None,
        };

        match outcome {
            Ok(path) => {
                report.cookie_file = Some(path.display().to_string());
                if let Ok(meta) = std::fs::metadata(path) {
                    report.file_exists = meta.is_file();
                    report.file_size = Some(meta.len());
                }
                if let Ok(contents) = std::fs::read_to_string(path) {
                    report.cookie_lines = count_cookie_lines(&contents);
                    report.netscape_header = has_netscape_header(&contents);
                }
            }
            Err(e) if env_present => report.error = Some(e.to_string()),
            Err(_) => {}
        }

        report
    }
}

/// Decode the payload and write it out. Whitespace inside the value, which
/// shells and dashboards like to insert, is ignored.
pub fn write_cookie_file(encoded: &str, path: &Path) -> Result<PathBuf, CookieError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| CookieError::Decode(e.to_string()))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(CookieError::Empty);
    }

    let write_err = |e: std::io::Error| CookieError::Write {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, &bytes).map_err(write_err)?;

    let contents = String::from_utf8_lossy(&bytes);
    if !has_netscape_header(&contents) {
        warn!("Cookie file has no Netscape header; yt-dlp may reject it");
    }
    Ok(path.to_path_buf())
}

fn has_netscape_header(contents: &str) -> bool {
    contents
        .lines()
        .next()
        .map(|line| NETSCAPE_HEADERS.iter().any(|h| line.trim_start().starts_with(h)))
        .unwrap_or(false)
}

/// Lines that hold a cookie entry: tab separated, not a comment. `#HttpOnly_`
/// prefixed entries count as cookies.
fn count_cookie_lines(contents: &str) -> usize {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with('#') || line.starts_with("#HttpOnly_"))
        .filter(|line| line.split('\t').count() >= 7)
        .count()
}
