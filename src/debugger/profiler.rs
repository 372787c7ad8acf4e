//! # Profiler
//!
//! Per-line execution counts and timings (§4.5), plus the analyzer that
//! turns the raw table into a human-readable report (§4.6): hotspots by
//! severity threshold, heuristic suggestions, and slowest/fastest/
//! most-executed extrema.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineStats {
    pub count: u64,
    pub total: Duration,
}

impl LineStats {
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / self.count as u32
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Profiler {
    enabled: bool,
    lines: BTreeMap<i32, LineStats>,
}

impl Profiler {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, lines: BTreeMap::new() }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&mut self, line: i32, elapsed: Duration) {
        if !self.enabled {
            return;
        }
        let stats = self.lines.entry(line).or_default();
        stats.count += 1;
        stats.total += elapsed;
    }

    pub fn total_statements(&self) -> u64 {
        self.lines.values().map(|s| s.count).sum()
    }

    pub fn lines(&self) -> impl Iterator<Item = (i32, &LineStats)> {
        self.lines.iter().map(|(l, s)| (*l, s))
    }

    pub fn report(&self) -> ProfileReport {
        ProfileReport::build(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hotspot {
    pub line: i32,
    pub share: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileReport {
    pub total_time: Duration,
    pub hotspots: Vec<Hotspot>,
    pub suggestions: Vec<String>,
    pub slowest: Option<i32>,
    pub fastest: Option<i32>,
    pub most_executed: Option<i32>,
}

const HOTSPOT_THRESHOLD: f64 = 0.10;

impl ProfileReport {
    fn build(profiler: &Profiler) -> Self {
        let total_time: Duration = profiler.lines.values().map(|s| s.total).sum();
        let total_nanos = total_time.as_secs_f64().max(f64::MIN_POSITIVE);

        let mut hotspots: Vec<Hotspot> = profiler
            .lines
            .iter()
            .map(|(&line, stats)| {
                let share = stats.total.as_secs_f64() / total_nanos;
                (line, share)
            })
            .filter(|(_, share)| *share >= HOTSPOT_THRESHOLD)
            .map(|(line, share)| Hotspot { line, share, severity: severity_for(share) })
            .collect();
        hotspots.sort_by(|a, b| b.share.partial_cmp(&a.share).unwrap());

        let slowest = profiler
            .lines
            .iter()
            .max_by_key(|(_, s)| s.total)
            .map(|(&l, _)| l);
        let fastest = profiler
            .lines
            .iter()
            .filter(|(_, s)| s.count > 0)
            .min_by_key(|(_, s)| s.total)
            .map(|(&l, _)| l);
        let most_executed = profiler
            .lines
            .iter()
            .max_by_key(|(_, s)| s.count)
            .map(|(&l, _)| l);

        let mut suggestions = Vec::new();
        for (&line, stats) in &profiler.lines {
            if stats.count > 100 && stats.mean() > Duration::from_micros(100) {
                suggestions.push(format!(
                    "line {}: executed {} times with a slow mean time — consider hoisting invariant work out of its loop",
                    line, stats.count
                ));
            }
        }
        for hotspot in &hotspots {
            if hotspot.severity == Severity::Critical {
                suggestions.push(format!(
                    "line {}: critical severity hotspot ({:.0}% of total time) — prioritize",
                    hotspot.line,
                    hotspot.share * 100.0
                ));
            }
        }

        ProfileReport { total_time, hotspots, suggestions, slowest, fastest, most_executed }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "total time: {:?}", self.total_time);
        if let Some(l) = self.most_executed {
            let _ = writeln!(out, "most executed: line {}", l);
        }
        if let Some(l) = self.slowest {
            let _ = writeln!(out, "slowest: line {}", l);
        }
        if let Some(l) = self.fastest {
            let _ = writeln!(out, "fastest: line {}", l);
        }
        for h in &self.hotspots {
            let _ = writeln!(out, "hotspot: line {} ({:?}, {:.1}%)", h.line, h.severity, h.share * 100.0);
        }
        for s in &self.suggestions {
            let _ = writeln!(out, "suggestion: {}", s);
        }
        out
    }
}

fn severity_for(share: f64) -> Severity {
    if share >= 0.50 {
        Severity::Critical
    } else if share >= 0.30 {
        Severity::High
    } else if share >= 0.10 {
        Severity::Medium
    } else {
        Severity::Low
    }
}
