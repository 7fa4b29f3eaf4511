//! Build timing statistics
//!
//! Reporting only; nothing here affects scheduling.

use crate::orchestrator::JobResult;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Aggregated timings for one library
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryStats {
    pub library: String,
    pub builds: usize,
    pub total: Duration,
}

impl LibraryStats {
    /// Mean duration per build
    pub fn average(&self) -> Duration {
        if self.builds == 0 {
            return Duration::ZERO;
        }
        self.total / self.builds as u32
    }
}

/// Statistics for a whole run
#[derive(Debug, Clone)]
pub struct BuildStats {
    results: Vec<JobResult>,
    started: Instant,
    wall_clock: Option<Duration>,
}

impl BuildStats {
    /// Start timing a run
    pub fn start() -> Self {
        Self {
            results: Vec::new(),
            started: Instant::now(),
            wall_clock: None,
        }
    }

    pub fn add_result(&mut self, result: JobResult) {
        self.results.push(result);
    }

    /// Stop the wall clock
    pub fn finish(&mut self) {
        self.wall_clock = Some(self.started.elapsed());
    }

    /// Override the measured wall clock
    pub fn with_wall_clock(mut self, wall_clock: Duration) -> Self {
        self.wall_clock = Some(wall_clock);
        self
    }

    pub fn results(&self) -> &[JobResult] {
        &self.results
    }

    /// Wall-clock duration (elapsed so far if not finished)
    pub fn wall_clock(&self) -> Duration {
        self.wall_clock.unwrap_or_else(|| self.started.elapsed())
    }

    /// Sum of all job durations
    pub fn cumulative(&self) -> Duration {
        self.results.iter().map(|r| r.duration).sum()
    }

    /// Cumulative time over wall-clock time
    pub fn parallelism(&self) -> f64 {
        let wall = self.wall_clock().as_secs_f64();
        if wall <= 0.0 {
            return 0.0;
        }
        self.cumulative().as_secs_f64() / wall
    }

    /// Per-library stats, largest total first (ties by name)
    pub fn per_library(&self) -> Vec<LibraryStats> {
        let mut by_lib: BTreeMap<&str, LibraryStats> = BTreeMap::new();
        for result in &self.results {
            let entry = by_lib
                .entry(result.library.as_str())
                .or_insert_with(|| LibraryStats {
                    library: result.library.clone(),
                    builds: 0,
                    total: Duration::ZERO,
                });
            entry.builds += 1;
            entry.total += result.duration;
        }

        let mut stats: Vec<LibraryStats> = by_lib.into_values().collect();
        stats.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.library.cmp(&b.library)));
        stats
    }
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.results.is_empty() {
            return Ok(());
        }

        writeln!(f, "{}", "=".repeat(70))?;
        writeln!(f, "Build Statistics")?;
        writeln!(f, "{}", "=".repeat(70))?;
        writeln!(f)?;
        writeln!(f, "{:<25} {:>8} {:>12} {:>12}", "Library", "Builds", "Total", "Avg")?;
        writeln!(f, "{} {} {} {}", "-".repeat(25), "-".repeat(8), "-".repeat(12), "-".repeat(12))?;
        for lib in self.per_library() {
            writeln!(
                f,
                "{:<25} {:>8} {:>12} {:>12}",
                lib.library,
                lib.builds,
                format_duration(lib.total),
                format_duration(lib.average())
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{}", "-".repeat(70))?;
        writeln!(f, "Total builds:          {}", self.results.len())?;
        writeln!(f, "Cumulative build time: {}", format_duration(self.cumulative()))?;
        writeln!(f, "Wall-clock time:       {}", format_duration(self.wall_clock()))?;
        write!(f, "Parallelism factor:    {:.1}x", self.parallelism())
    }
}

/// Human readable duration: `4.2s`, `3m 7s`, `1h 5m`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let minutes = (secs / 60.0).floor();
        format!("{}m {:.0}s", minutes as u64, secs - minutes * 60.0)
    } else {
        let hours = (secs / 3600.0).floor();
        let minutes = ((secs - hours * 3600.0) / 60.0).floor();
        format!("{}h {}m", hours as u64, minutes as u64)
    }
}
