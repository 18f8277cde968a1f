use crate::{cli::OutputFormat, error::Result};
#[cfg(feature = "colored-output")]
use colored::*;
use serde::Serialize;
use std::io::Write;
use stream_resolver::{
    CandidateUrl, DiagnosticReport, ExtractionResult, HealthStatus, ResolvedEpisode,
    StatsSnapshot,
};

pub struct OutputManager {
    colored: bool,
    format: OutputFormat,
}

impl OutputManager {
    pub fn new(colored: bool, format: OutputFormat) -> Self {
        Self { colored, format }
    }

    pub fn format_candidate(&self, candidate: &CandidateUrl) -> Result<String> {
        self.render(candidate, |out| {
            out.header("Classification");
            out.field("URL", &candidate.raw, Color::Blue);
            out.field("Container", candidate.container.as_str(), Color::Cyan);
            out.field("Quality", candidate.quality, Color::Cyan);
            out.field("Direct", &candidate.is_direct.to_string(), Color::Cyan);
        })
    }

    pub fn format_result(&self, result: &ExtractionResult) -> Result<String> {
        self.render(result, |out| self.result_lines(out, result))
    }

    pub fn format_episode(&self, resolved: &ResolvedEpisode) -> Result<String> {
        self.render(resolved, |out| {
            self.result_lines(out, &resolved.result);
            out.header("Selection");
            out.field("Language", &resolved.selected_language, Color::Cyan);
            out.field("Mirror", &resolved.selected_source_index.to_string(), Color::Cyan);
            out.field("Source", &resolved.original_url, Color::Blue);
            out.field(
                "Candidates",
                &format!("{}/{}", resolved.candidates_tried, resolved.candidates_total),
                Color::Cyan,
            );
        })
    }

    pub fn format_health(&self, health: &HealthStatus) -> Result<String> {
        self.render(health, |out| self.health_lines(out, health))
    }

    pub fn format_report(&self, report: &DiagnosticReport) -> Result<String> {
        self.render(report, |out| {
            self.health_lines(out, &report.health);
            match (&report.result, &report.error) {
                (Some(result), _) => self.result_lines(out, result),
                (None, Some(error)) => {
                    out.header("Extraction");
                    out.field("Error", error, Color::Yellow);
                }
                (None, None) => {}
            }
            out.field("Duration", &format!("{} ms", report.duration_ms), Color::Cyan);
            self.stats_lines(out, &report.stats);
        })
    }

    fn render<T: Serialize>(&self, value: &T, pretty: impl FnOnce(&mut Lines)) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let mut json = serde_json::to_string_pretty(value)?;
                json.push('\n');
                Ok(json)
            }
            OutputFormat::Pretty => {
                let mut lines = Lines {
                    colored: self.colored,
                    buffer: String::new(),
                };
                pretty(&mut lines);
                Ok(lines.buffer)
            }
        }
    }

    fn result_lines(&self, out: &mut Lines, result: &ExtractionResult) {
        out.header("Stream");
        out.field("URL", &result.url, Color::Blue);
        out.field("Container", result.container.as_str(), Color::Cyan);
        out.field("Quality", &result.quality, Color::Cyan);
        if let Some(extractor) = &result.extractor {
            out.field("Extractor", extractor, Color::Cyan);
        }
        out.field("Attempts", &result.attempts.to_string(), Color::Cyan);
        out.field("Elapsed", &format!("{} ms", result.elapsed_ms), Color::Cyan);
        out.field("Cached", &result.cached.to_string(), Color::Cyan);
        if !result.headers.is_empty() {
            out.field("Headers", "", Color::Cyan);
            let mut headers: Vec<_> = result.headers.iter().collect();
            headers.sort();
            for (name, value) in headers {
                out.push(format!("    {}: {}\n", out.paint(name, Color::Green, false), value));
            }
        }
    }

    fn health_lines(&self, out: &mut Lines, health: &HealthStatus) {
        out.header("Extraction Service");
        let state = if health.success { "reachable" } else { "unreachable" };
        out.field("Status", state, if health.success { Color::Green } else { Color::Yellow });
        out.field("Message", &health.message, Color::Cyan);
        if let Some(version) = &health.version {
            out.field("Version", version, Color::Cyan);
        }
        if let Some(uptime) = health.uptime_seconds {
            out.field("Uptime", &format!("{uptime:.0} s"), Color::Cyan);
        }
        if health.supported_hosts > 0 {
            out.field("Hosts", &health.supported_hosts.to_string(), Color::Cyan);
        }
    }

    fn stats_lines(&self, out: &mut Lines, stats: &StatsSnapshot) {
        out.header("Statistics");
        out.field("Requests", &stats.total_requests.to_string(), Color::Cyan);
        out.field(
            "Success rate",
            &format!("{:.1}%", stats.success_rate * 100.0),
            Color::Cyan,
        );
        out.field(
            "Cache hit rate",
            &format!("{:.1}%", stats.cache_hit_rate * 100.0),
            Color::Cyan,
        );
        out.field("Avg latency", &format!("{} ms", stats.avg_latency_ms), Color::Cyan);
    }
}

/// Pretty-output buffer.
struct Lines {
    colored: bool,
    buffer: String,
}

impl Lines {
    fn header(&mut self, title: &str) {
        let line = format!("{}\n", self.paint(&format!("{title}:"), Color::Green, true));
        self.buffer.push_str(&line);
    }

    fn field(&mut self, label: &str, value: &str, color: Color) {
        let line = format!(
            "  {}: {}\n",
            self.paint(label, Color::Yellow, false),
            self.paint(value, color, false)
        );
        self.buffer.push_str(&line);
    }

    fn push(&mut self, line: String) {
        self.buffer.push_str(&line);
    }

    fn paint(&self, text: &str, color: Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Blue => text.blue(),
                    Color::Cyan => text.cyan(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            let _ = (self.colored, color, bold);
            text.to_string()
        }
    }
}

#[derive(Clone, Copy)]
enum Color {
    Green,
    Yellow,
    Blue,
    Cyan,
}

pub fn write_output(content: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(content.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
