//! Multi-source selection over an episode's language tracks and mirrors.
//!
//! Candidates are ordered by language priority first and mirror index second,
//! then tried one at a time until one resolves. Each candidate goes through the
//! full [`ExtractionEngine`] path, so it gets its own retry budget and cache
//! entries.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classifier;
use crate::config::ExtractOptions;
use crate::engine::{ExtractionEngine, short_url};
use crate::error::{ResolveError, Result};
use crate::media::{Episode, ResolvedEpisode};

/// Ordered list of preferred language labels, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePriority(Vec<String>);

impl Default for LanguagePriority {
    fn default() -> Self {
        Self::new(["VOSTFR", "VF", "FR", "VO", "SUB", "DEFAULT"])
    }
}

impl LanguagePriority {
    pub fn new<I, S>(languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(languages.into_iter().map(Into::into).collect())
    }

    pub fn languages(&self) -> &[String] {
        &self.0
    }

    /// Position of `language` in the list, if present.
    pub fn rank(&self, language: &str) -> Option<usize> {
        self.0
            .iter()
            .position(|l| l.eq_ignore_ascii_case(language))
    }
}

/// One mirror to try, in the order it will be tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedCandidate {
    pub language: String,
    /// Index of the mirror within its track, before unsafe mirrors are dropped.
    pub index: usize,
    pub url: String,
}

/// Flattens an episode into the ordered candidate list.
///
/// Ranked tracks come first in priority order, unranked ones follow in the order
/// they appear. A repeated label is ignored after its first occurrence. Empty and
/// unsafe mirrors are dropped.
pub fn plan_candidates(episode: &Episode, priority: &LanguagePriority) -> Vec<RankedCandidate> {
    let mut tracks = Vec::with_capacity(episode.tracks.len());
    for (position, track) in episode.tracks.iter().enumerate() {
        let duplicate = episode.tracks[..position]
            .iter()
            .any(|earlier| earlier.language.eq_ignore_ascii_case(&track.language));
        if duplicate {
            debug!(language = %track.language, "Ignoring duplicate language track");
            continue;
        }
        let rank = priority.rank(&track.language).unwrap_or(usize::MAX);
        tracks.push((rank, position, track));
    }
    tracks.sort_by_key(|&(rank, position, _)| (rank, position));

    let mut candidates = Vec::new();
    for (_, _, track) in tracks {
        for (index, source) in track.sources.iter().enumerate() {
            let url = source.trim();
            if url.is_empty() {
                continue;
            }
            if !classifier::is_safe(url) {
                debug!(language = %track.language, index, url = short_url(url), "Skipping unsafe mirror");
                continue;
            }
            candidates.push(RankedCandidate {
                language: track.language.clone(),
                index,
                url: url.to_string(),
            });
        }
    }
    candidates
}

/// Resolves episodes by walking their candidates through an [`ExtractionEngine`].
pub struct SourceSelector {
    engine: Arc<ExtractionEngine>,
    options: ExtractOptions,
}

impl SourceSelector {
    pub fn new(engine: Arc<ExtractionEngine>, options: ExtractOptions) -> Self {
        Self { engine, options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub async fn resolve_episode(
        &self,
        episode: &Episode,
        priority: &LanguagePriority,
    ) -> Result<ResolvedEpisode> {
        self.resolve_episode_with_cancel(episode, priority, &CancellationToken::new())
            .await
    }

    /// Tries candidates sequentially and returns the first that resolves.
    pub async fn resolve_episode_with_cancel(
        &self,
        episode: &Episode,
        priority: &LanguagePriority,
        token: &CancellationToken,
    ) -> Result<ResolvedEpisode> {
        let stats = &self.engine.context().stats;
        let candidates = plan_candidates(episode, priority);
        let total = candidates.len();

        if candidates.is_empty() {
            warn!(episode = episode.label(), "Episode has no usable source");
            stats.record_episode(false);
            return Err(ResolveError::no_valid_source(0, None));
        }

        info!(
            episode = episode.label(),
            candidates = total,
            "Resolving episode"
        );

        let mut last_error = None;
        for (position, candidate) in candidates.into_iter().enumerate() {
            if token.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }

            debug!(
                language = %candidate.language,
                index = candidate.index,
                candidate = position + 1,
                total,
                "Trying candidate"
            );

            match self
                .engine
                .extract_with_cancel(&candidate.url, &self.options, token)
                .await
            {
                Ok(result) => {
                    info!(
                        episode = episode.label(),
                        language = %candidate.language,
                        index = candidate.index,
                        tried = position + 1,
                        "Episode resolved"
                    );
                    stats.record_episode(true);
                    return Ok(ResolvedEpisode {
                        result,
                        selected_language: candidate.language,
                        selected_source_index: candidate.index,
                        original_url: candidate.url,
                        candidates_tried: position + 1,
                        candidates_total: total,
                    });
                }
                Err(ResolveError::Cancelled) => return Err(ResolveError::Cancelled),
                Err(e) => {
                    warn!(
                        language = %candidate.language,
                        index = candidate.index,
                        error = %e,
                        "Candidate failed, moving on"
                    );
                    last_error = Some(e);
                }
            }
        }

        warn!(episode = episode.label(), total, "All candidates failed");
        stats.record_episode(false);
        Err(ResolveError::no_valid_source(total, last_error))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::context::ResolverContext;
    use crate::test_support::{Script, ScriptedBackend, StaticValidator, fast_policy};

    fn selector(backend: Arc<ScriptedBackend>) -> SourceSelector {
        let engine = ExtractionEngine::new(
            backend,
            Arc::new(StaticValidator::Accept),
            Arc::new(ResolverContext::default()),
            fast_policy(),
            Duration::from_secs(60),
        );
        SourceSelector::new(Arc::new(engine), ExtractOptions::for_episodes())
    }

    #[test]
    fn ordering_follows_priority_then_mirror_index() {
        let episode = Episode::new("ep-1", "")
            .with_track("VF", ["https://b.example/0"])
            .with_track("VOSTFR", ["https://a.example/0", "https://a.example/1"]);

        let urls: Vec<_> = plan_candidates(&episode, &LanguagePriority::default())
            .into_iter()
            .map(|c| c.url)
            .collect();
        assert_eq!(
            urls,
            ["https://a.example/0", "https://a.example/1", "https://b.example/0"]
        );
    }

    #[test]
    fn unranked_tracks_come_last_in_encounter_order() {
        let episode = Episode::new("ep-1", "")
            .with_track("KR", ["https://k.example/0"])
            .with_track("JP", ["https://j.example/0"])
            .with_track("vo", ["https://o.example/0"]);

        let languages: Vec<_> = plan_candidates(&episode, &LanguagePriority::default())
            .into_iter()
            .map(|c| c.language)
            .collect();
        assert_eq!(languages, ["vo", "KR", "JP"]);
    }

    #[test]
    fn unsafe_and_empty_mirrors_are_dropped_keeping_indices() {
        let episode = Episode::new("ep-1", "").with_track(
            "VOSTFR",
            [
                "https://ads.example.com/x",
                "  ",
                "https://sendvid.com/embed/ok",
            ],
        );
        let candidates = plan_candidates(&episode, &LanguagePriority::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].index, 2);
    }

    #[test]
    fn duplicate_labels_keep_the_first_track() {
        let mut episode = Episode::new("ep-1", "").with_track("VF", ["https://first.example/0"]);
        episode.tracks.push(crate::media::LanguageTrack {
            language: "vf".into(),
            sources: vec!["https://second.example/0".into()],
        });
        let candidates = plan_candidates(&episode, &LanguagePriority::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://first.example/0");
    }

    #[tokio::test]
    async fn falls_through_to_next_mirror() {
        let backend = Arc::new(
            ScriptedBackend::always_ok("https://cdn.example/ok.mp4")
                .route("a.example/0", Script::Fail),
        );
        let selector = selector(backend.clone());
        let episode = Episode::new("ep-1", "Episode 1")
            .with_track("VF", ["https://c.example/0"])
            .with_track("VOSTFR", ["https://a.example/0", "https://a.example/1"]);

        let resolved = selector
            .resolve_episode(&episode, &LanguagePriority::default())
            .await
            .unwrap();

        assert_eq!(resolved.selected_language, "VOSTFR");
        assert_eq!(resolved.selected_source_index, 1);
        assert_eq!(resolved.candidates_tried, 2);
        assert_eq!(resolved.candidates_total, 3);
        assert_eq!(resolved.original_url, "https://a.example/1");
        // six attempts on the first mirror, one on the second
        assert_eq!(backend.calls(), 7);
    }

    #[tokio::test]
    async fn episode_without_sources_makes_no_calls() {
        let backend = Arc::new(ScriptedBackend::always_ok("https://cdn.example/ok.mp4"));
        let selector = selector(backend.clone());
        let episode = Episode::new("ep-2", "").with_track("VF", Vec::<String>::new());

        let err = selector
            .resolve_episode(&episode, &LanguagePriority::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoValidSource { candidates: 0, .. }));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn episode_without_tracks_fails_fast() {
        let backend = Arc::new(ScriptedBackend::always_ok("https://cdn.example/ok.mp4"));
        let selector = selector(backend.clone());

        let err = selector
            .resolve_episode(&Episode::new("x", ""), &LanguagePriority::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoValidSource { candidates: 0, last: None }));
        assert_eq!(backend.calls(), 0);

        let snapshot = selector.engine.context().snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.episode_failures, 1);
    }

    #[tokio::test]
    async fn all_failures_report_the_last_error() {
        let backend = Arc::new(ScriptedBackend::always_failing());
        let selector = selector(backend.clone());
        let episode = Episode::new("ep-3", "")
            .with_track("VF", ["https://a.example/0", "https://a.example/1"]);

        let err = selector
            .resolve_episode(&episode, &LanguagePriority::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoValidSource { candidates: 2, .. }));
        assert!(matches!(err.last_error(), Some(ResolveError::ExhaustedRetries { .. })));
        assert_eq!(backend.calls(), 12);

        let snapshot = selector.engine.context().snapshot();
        assert_eq!(snapshot.episode_requests, 1);
        assert_eq!(snapshot.episode_failures, 1);
    }
}
