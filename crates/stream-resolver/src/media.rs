//! Data model shared by the pipeline: candidates, extraction results and episodes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classifier;

/// Media container of a playable URL.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    Hls,
    Mp4,
    Webm,
    /// Unknown container, assumed playable.
    Video,
}

impl ContainerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerType::Hls => "hls",
            ContainerType::Mp4 => "mp4",
            ContainerType::Webm => "webm",
            ContainerType::Video => "video",
        }
    }

    /// Lenient parse used for the backend's `type` field.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "hls" | "m3u8" => ContainerType::Hls,
            "mp4" => ContainerType::Mp4,
            "webm" => ContainerType::Webm,
            _ => ContainerType::Video,
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified reference to a video source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateUrl {
    pub raw: String,
    pub container: ContainerType,
    pub quality: &'static str,
    pub is_direct: bool,
}

impl CandidateUrl {
    pub fn classify(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            container: classifier::classify_type(&raw),
            quality: classifier::infer_quality(&raw),
            is_direct: classifier::is_direct(&raw),
            raw,
        }
    }
}

/// The outcome of resolving one candidate into a playable URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Playable URL.
    pub url: String,
    pub container: ContainerType,
    pub quality: String,
    /// Headers the player must send when fetching `url`.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Backend strategy that produced the URL, if reported.
    pub extractor: Option<String>,
    pub direct: bool,
    /// Client-side attempts used, 0 for direct URLs.
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub cached: bool,
    pub backend_version: Option<String>,
    pub backend_attempt: Option<u32>,
    pub backend_time_ms: Option<u64>,
}

impl ExtractionResult {
    /// Synthetic result for a URL that needs no extraction.
    pub fn direct(url: &str) -> Self {
        Self {
            url: url.to_string(),
            container: classifier::classify_type(url),
            quality: classifier::infer_quality(url).to_string(),
            headers: HashMap::new(),
            extractor: None,
            direct: true,
            attempts: 0,
            elapsed_ms: 0,
            cached: false,
            backend_version: None,
            backend_attempt: None,
            backend_time_ms: None,
        }
    }
}

impl fmt::Display for ExtractionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({}ms)", self.container, self.quality, self.elapsed_ms)?;
        if self.cached {
            f.write_str(" [cached]")?;
        }
        Ok(())
    }
}

/// A named language variant of an episode with its ordered mirrors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageTrack {
    pub language: String,
    /// Mirror URLs, primary first.
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tracks: Vec<LanguageTrack>,
}

impl Episode {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            tracks: Vec::new(),
        }
    }

    /// Adds a track, replacing the mirrors of an existing track with the same label.
    pub fn with_track<I, S>(mut self, language: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let language = language.into();
        let sources: Vec<String> = sources.into_iter().map(Into::into).collect();
        match self
            .tracks
            .iter_mut()
            .find(|t| t.language.eq_ignore_ascii_case(&language))
        {
            Some(track) => track.sources = sources,
            None => self.tracks.push(LanguageTrack { language, sources }),
        }
        self
    }

    pub fn track(&self, language: &str) -> Option<&LanguageTrack> {
        self.tracks
            .iter()
            .find(|t| t.language.eq_ignore_ascii_case(language))
    }

    /// Label used in logs: the title, or the id when untitled.
    pub fn label(&self) -> &str {
        if self.title.is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

/// An [`ExtractionResult`] annotated with the candidate that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEpisode {
    #[serde(flatten)]
    pub result: ExtractionResult,
    pub selected_language: String,
    /// Mirror index within the selected track.
    pub selected_source_index: usize,
    pub original_url: String,
    pub candidates_tried: usize,
    pub candidates_total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_classification() {
        let c = CandidateUrl::classify("https://cdn.example.com/ep1_720p.m3u8?t=1");
        assert!(c.is_direct);
        assert_eq!(c.container, ContainerType::Hls);
        assert_eq!(c.quality, "720p");

        let embed = CandidateUrl::classify("https://video.sibnet.ru/shell.php?videoid=42");
        assert!(!embed.is_direct);
        assert_eq!(embed.container, ContainerType::Video);
    }

    #[test]
    fn with_track_keeps_labels_unique() {
        let episode = Episode::new("ep-1", "Episode 1")
            .with_track("VOSTFR", ["https://a.example/1"])
            .with_track("VF", ["https://b.example/1"])
            .with_track("vostfr", ["https://a.example/2", "https://a.example/3"]);

        assert_eq!(episode.tracks.len(), 2);
        assert_eq!(episode.tracks[0].language, "VOSTFR");
        assert_eq!(episode.track("VOSTFR").unwrap().sources.len(), 2);
    }

    #[test]
    fn episode_json_shape() {
        let json = r#"{
            "id": "ep-3",
            "title": "Episode 3",
            "tracks": [
                { "language": "VF", "sources": ["https://a.example/x"] },
                { "language": "VOSTFR" }
            ]
        }"#;
        let episode: Episode = serde_json::from_str(json).unwrap();
        assert_eq!(episode.tracks.len(), 2);
        assert!(episode.tracks[1].sources.is_empty());
        assert_eq!(episode.label(), "Episode 3");
    }

    #[test]
    fn container_parse_is_lenient() {
        assert_eq!(ContainerType::parse_lenient("M3U8"), ContainerType::Hls);
        assert_eq!(ContainerType::parse_lenient("mp4"), ContainerType::Mp4);
        assert_eq!(ContainerType::parse_lenient("flv"), ContainerType::Video);
        assert_eq!(
            serde_json::to_string(&ContainerType::Webm).unwrap(),
            "\"webm\""
        );
    }
}
