use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::formats::VideoInfo;

#[derive(Error, Debug, Clone)]
pub enum ExtractError {
    #[error("yt-dlp is unavailable: {0}")]
    Unavailable(String),
    /// Message raised by yt-dlp itself, passed through verbatim.
    #[error("{0}")]
    Failed(String),
    #[error("Extraction timed out after {0}s")]
    Timeout(u64),
    #[error("Extraction task failed: {0}")]
    Task(String),
    #[error("Failed to parse extraction result: {0}")]
    Malformed(String),
}

/// Resolves a video page into yt-dlp's info dict, serialized as JSON.
/// Implementations are blocking; callers run them on the blocking pool.
pub trait Extractor: Send + Sync {
    fn extract(&self, url: &str, cookie_file: Option<&Path>) -> Result<String, ExtractError>;

    fn version(&self) -> Option<String> {
        None
    }
}

/// yt-dlp driven in-process through the embedded Python interpreter.
#[derive(Clone, Debug)]
pub struct YtDlp {
    socket_timeout: u64,
}

impl YtDlp {
    pub fn new(socket_timeout: u64) -> Self {
        Self { socket_timeout }
    }
}

fn py_err(context: &str) -> impl Fn(PyErr) -> ExtractError + '_ {
    move |e| ExtractError::Unavailable(format!("{context}: {e}"))
}

impl Extractor for YtDlp {
    fn extract(&self, url: &str, cookie_file: Option<&Path>) -> Result<String, ExtractError> {
        Python::with_gil(|py| {
            let yt_dlp = py.import("yt_dlp").map_err(py_err("Failed to import yt_dlp"))?;

            let opts = PyDict::new(py);
            let build_err = py_err("Failed to build options");
            opts.set_item("quiet", true).map_err(&build_err)?;
            opts.set_item("no_warnings", true).map_err(&build_err)?;
            opts.set_item("skip_download", true).map_err(&build_err)?;
            opts.set_item("socket_timeout", self.socket_timeout)
                .map_err(&build_err)?;
            if let Some(cookies) = cookie_file.filter(|p| p.exists()) {
                opts.set_item("cookiefile", cookies.to_string_lossy().into_owned())
                    .map_err(&build_err)?;
            }

            let ydl = yt_dlp
                .getattr("YoutubeDL")
                .and_then(|class| class.call1((opts,)))
                .map_err(py_err("Failed to create YoutubeDL"))?;

            let kwargs = PyDict::new(py);
            kwargs.set_item("download", false).map_err(&build_err)?;
            let extracted = ydl
                .call_method("extract_info", (url,), Some(&kwargs))
                .and_then(|info| ydl.call_method1("sanitize_info", (info,)));

            // Release the cookie jar and file handles before inspecting the result.
            let _ = ydl.call_method0("close");

            let info = extracted.map_err(|e| ExtractError::Failed(e.to_string()))?;
            let json_str = py
                .import("json")
                .and_then(|json| json.call_method1("dumps", (info,)))
                .and_then(|dumped| dumped.extract::<String>())
                .map_err(|e| ExtractError::Malformed(e.to_string()))?;

            debug!("yt-dlp returned {} bytes for {url}", json_str.len());
            Ok(json_str)
        })
    }

    fn version(&self) -> Option<String> {
        Python::with_gil(|py| {
            py.import("yt_dlp.version")
                .and_then(|m| m.getattr("__version__"))
                .and_then(|v| v.extract::<String>())
                .ok()
        })
    }
}

/// One extraction attempt: run the blocking extractor under a timeout and
/// parse its output.
pub async fn extract_once(
    extractor: Arc<dyn Extractor>,
    url: &str,
    cookie_file: Option<&Path>,
    timeout: Duration,
) -> Result<VideoInfo, ExtractError> {
    let url_owned = url.to_string();
    let cookies = cookie_file.map(Path::to_path_buf);

    // A timeout only abandons the wait; the blocking call runs to completion
    // in the background, alongside any retry.
    let result = tokio::time::timeout(
        timeout,
        tokio::task::spawn_blocking(move || extractor.extract(&url_owned, cookies.as_deref())),
    )
    .await;

    let json_str = match result {
        Ok(Ok(extracted)) => extracted?,
        Ok(Err(e)) => return Err(ExtractError::Task(e.to_string())),
        Err(_) => return Err(ExtractError::Timeout(timeout.as_secs())),
    };

    serde_json::from_str(&json_str).map_err(|e| ExtractError::Malformed(e.to_string()))
}
