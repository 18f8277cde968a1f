//! Pure URL classification: direct-media detection, container and quality
//! inference, and the ad/tracker safety filter.
//!
//! Every function here is total. Malformed input yields the conservative answer
//! (`false`, [`ContainerType::Video`], `"auto"`), never a panic.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::media::ContainerType;

/// URLs longer than this are rejected by [`is_safe`].
pub const MAX_URL_LENGTH: usize = 2000;

/// Quality label returned when no marker matches.
pub const DEFAULT_QUALITY: &str = "auto";

const DIRECT_EXTENSIONS: [(&str, ContainerType); 3] = [
    (".m3u8", ContainerType::Hls),
    (".mp4", ContainerType::Mp4),
    (".webm", ContainerType::Webm),
];

/// Ordered quality markers; the first pattern that matches wins.
static QUALITY_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)4k|2160p?|uhd", "2160p"),
        (r"(?i)1440p?|2k", "1440p"),
        (r"(?i)1080p?|fhd|fullhd", "1080p"),
        (r"(?i)720p?|hd", "720p"),
        (r"(?i)480p?|sd", "480p"),
        (r"(?i)360p?", "360p"),
        (r"(?i)240p?", "240p"),
    ]
    .into_iter()
    .filter_map(|(pattern, label)| Regex::new(pattern).ok().map(|re| (re, label)))
    .collect()
});

/// Ad, tracker and analytics domains rejected anywhere in the URL.
const DENIED_DOMAINS: [&str; 3] = [
    "doubleclick.net",
    "googlesyndication.com",
    "ak.amskiploomr.com",
];

/// Host labels that mark ad/tracking subdomains, e.g. `ads.example.com`.
static DENIED_HOST_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\.)(?:ads|tracker|analytics|pixel|beacon)\.").expect("valid regex")
});

/// The URL path with query and fragment removed, lowercased.
fn media_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => {
            let end = url.find(['?', '#']).unwrap_or(url.len());
            url[..end].to_ascii_lowercase()
        }
    }
}

fn direct_container(url: &str) -> Option<ContainerType> {
    let path = media_path(url);
    DIRECT_EXTENSIONS
        .iter()
        .find(|(ext, _)| path.ends_with(ext))
        .map(|(_, container)| *container)
}

/// True when the URL already points at a playable container (`.mp4`, `.m3u8`, `.webm`).
pub fn is_direct(url: &str) -> bool {
    direct_container(url).is_some()
}

/// Infers the container from the URL extension. Unknown extensions map to
/// [`ContainerType::Video`].
pub fn classify_type(url: &str) -> ContainerType {
    direct_container(url).unwrap_or(ContainerType::Video)
}

/// Infers a quality label such as `"1080p"` from markers in the URL.
pub fn infer_quality(url: &str) -> &'static str {
    QUALITY_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(url))
        .map(|(_, label)| *label)
        .unwrap_or(DEFAULT_QUALITY)
}

/// Rejects non-HTTP schemes, overlong URLs and known ad/tracker hosts.
pub fn is_safe(url: &str) -> bool {
    if url.is_empty() || url.chars().count() > MAX_URL_LENGTH {
        return false;
    }

    let lowered = url.to_ascii_lowercase();
    if DENIED_DOMAINS.iter().any(|domain| lowered.contains(domain)) {
        return false;
    }

    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }

    match parsed.host_str() {
        Some(host) => !DENIED_HOST_LABEL.is_match(host),
        None => false,
    }
}
