use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::cmp::Ordering;

/// One entry of yt-dlp's `formats` list. Only the fields the selection
/// policy and the response need are read; everything else is ignored.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct StreamCandidate {
    pub format_id: Option<String>,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub tbr: Option<f64>,
    pub url: Option<String>,
}

impl StreamCandidate {
    pub fn has_video(&self) -> bool {
        codec_present(self.vcodec.as_deref())
    }

    pub fn has_audio(&self) -> bool {
        codec_present(self.acodec.as_deref())
    }

    /// Both tracks in a single file.
    pub fn is_progressive(&self) -> bool {
        self.has_video() && self.has_audio()
    }

    fn height_or_zero(&self) -> u32 {
        self.height.unwrap_or(0)
    }

    fn tbr_or_zero(&self) -> f64 {
        self.tbr.unwrap_or(0.0)
    }

    fn has_url(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// yt-dlp reports a missing track as the literal codec "none".
fn codec_present(codec: Option<&str>) -> bool {
    match codec {
        Some(c) => {
            let c = c.trim();
            !c.is_empty() && !c.eq_ignore_ascii_case("none")
        }
        None => false,
    }
}

/// The parts of yt-dlp's info dict the service reads.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct VideoInfo {
    pub title: Option<String>,
    pub duration: Option<Number>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub formats: Vec<StreamCandidate>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<StreamCandidate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<StreamCandidate>>::deserialize(deserializer)?.unwrap_or_default())
}

/// JSON body returned by `GET /download`.
#[derive(Serialize, Debug)]
pub struct DownloadResponse {
    pub title: Option<String>,
    pub duration: Option<Number>,
    pub download_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcodec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acodec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

impl DownloadResponse {
    /// `None` when the chosen candidate carries no usable URL.
    pub fn from_selection(info: &VideoInfo, best: &StreamCandidate) -> Option<Self> {
        let download_url = best.url.clone().filter(|u| !u.is_empty())?;
        Some(Self {
            title: info.title.clone(),
            duration: info.duration.clone(),
            download_url,
            ext: best.ext.clone(),
            vcodec: best.vcodec.clone(),
            acodec: best.acodec.clone(),
            height: best.height,
            width: best.width,
        })
    }
}

/// Pick the stream to hand back to the client.
///
/// First choice is an mp4 carrying both tracks at or below `max_height`,
/// highest first (earliest entry wins a tie). Failing that, any entry with
/// both tracks, ranked by `(height, tbr)` with the latest entry winning a
/// tie. Entries without a URL are never returned.
pub fn select_best(formats: &[StreamCandidate], max_height: u32) -> Option<&StreamCandidate> {
    let usable = || formats.iter().filter(|f| f.has_url() && f.is_progressive());

    let preferred = usable()
        .filter(|f| f.ext.as_deref() == Some("mp4") && f.height_or_zero() <= max_height)
        .rev()
        .max_by_key(|f| f.height_or_zero());
    if preferred.is_some() {
        return preferred;
    }

    usable().max_by(|a, b| {
        a.height_or_zero().cmp(&b.height_or_zero()).then_with(|| {
            a.tbr_or_zero()
                .partial_cmp(&b.tbr_or_zero())
                .unwrap_or(Ordering::Equal)
        })
    })
}
