use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Settings {
    pub port: u16,
    /// Base64-encoded Netscape cookie file, if provided.
    pub cookies_b64: Option<String>,
    /// Where the decoded cookie file is written.
    pub cookies_path: PathBuf,
    pub ytdlp_timeout: u64,
    pub socket_timeout: u64,
    pub max_attempts: u32,
    pub backoff_base: u64,
    pub max_height: u32,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. `from_env` is this over
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let cookies_b64 = lookup("YOUTUBE_COOKIES_B64").filter(|v| !v.trim().is_empty());
        let cookies_path = lookup("COOKIES_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("ytlink_cookies.txt"));

        Self {
            port: env_parse(&lookup, "PORT", 10000),
            cookies_b64,
            cookies_path,
            ytdlp_timeout: env_parse(&lookup, "YTDLP_TIMEOUT", 60),
            socket_timeout: env_parse(&lookup, "SOCKET_TIMEOUT", 30),
            max_attempts: env_parse(&lookup, "EXTRACT_ATTEMPTS", 3),
            backoff_base: env_parse(&lookup, "EXTRACT_BACKOFF_SECS", 2),
            max_height: env_parse(&lookup, "MAX_HEIGHT", 1080),
        }
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.ytdlp_timeout)
    }
}

fn env_parse<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
