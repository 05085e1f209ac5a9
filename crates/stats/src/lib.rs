//! Descriptive statistics and correlation over biorhythm series.
//!
//! Pure functions of their input — no I/O, no caching. Standard deviation
//! uses the population formula so reported values are consistent across
//! input sizes; correlation is Pearson's product-moment. Degenerate input
//! (fewer than two points, zero-variance cycles) yields explicit markers,
//! never NaN.

use common::types::BiorhythmSeries;

/// The three cycles tracked per person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    Physical,
    Emotional,
    Intellectual,
}

pub const CYCLES: [Cycle; 3] = [Cycle::Physical, Cycle::Emotional, Cycle::Intellectual];

impl Cycle {
    pub fn label(self) -> &'static str {
        match self {
            Cycle::Physical => "physical",
            Cycle::Emotional => "emotional",
            Cycle::Intellectual => "intellectual",
        }
    }

    fn index(self) -> usize {
        match self {
            Cycle::Physical => 0,
            Cycle::Emotional => 1,
            Cycle::Intellectual => 2,
        }
    }
}

/// Descriptive statistics for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleStats {
    pub mean: f64,
    /// Population standard deviation. Exactly 0.0 flags a constant cycle.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Per-cycle statistics for a whole series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStats {
    pub physical: CycleStats,
    pub emotional: CycleStats,
    pub intellectual: CycleStats,
}

impl SeriesStats {
    pub fn get(&self, cycle: Cycle) -> &CycleStats {
        match cycle {
            Cycle::Physical => &self.physical,
            Cycle::Emotional => &self.emotional,
            Cycle::Intellectual => &self.intellectual,
        }
    }
}

/// Symmetric 3×3 Pearson matrix. Cells involving a zero-variance cycle are
/// `None` — Pearson's r is undefined there, and `None` beats a fabricated
/// number or NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationMatrix {
    cells: [[Option<f64>; 3]; 3],
}

impl CorrelationMatrix {
    pub fn get(&self, a: Cycle, b: Cycle) -> Option<f64> {
        self.cells[a.index()][b.index()]
    }
}

/// Result of `correlate`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correlation {
    Matrix(CorrelationMatrix),
    /// Fewer than two points: no pairwise statement can be made at all.
    InsufficientData,
}

/// Compute per-cycle descriptive statistics. `None` for an empty series.
pub fn describe(series: &BiorhythmSeries) -> Option<SeriesStats> {
    if series.is_empty() {
        return None;
    }
    Some(SeriesStats {
        physical: cycle_stats(&column(series, Cycle::Physical)),
        emotional: cycle_stats(&column(series, Cycle::Emotional)),
        intellectual: cycle_stats(&column(series, Cycle::Intellectual)),
    })
}

/// Compute the Pearson correlation matrix over the series' cycles.
pub fn correlate(series: &BiorhythmSeries) -> Correlation {
    if series.len() < 2 {
        return Correlation::InsufficientData;
    }

    let cols = CYCLES.map(|c| column(series, c));
    let means = [mean(&cols[0]), mean(&cols[1]), mean(&cols[2])];
    let sds = [
        pop_std_dev(&cols[0], means[0]),
        pop_std_dev(&cols[1], means[1]),
        pop_std_dev(&cols[2], means[2]),
    ];

    let mut cells = [[None; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            if sds[i] == 0.0 || sds[j] == 0.0 {
                continue;
            }
            if i == j {
                cells[i][j] = Some(1.0);
                continue;
            }
            let n = cols[i].len() as f64;
            let cov = cols[i]
                .iter()
                .zip(&cols[j])
                .map(|(x, y)| (x - means[i]) * (y - means[j]))
                .sum::<f64>()
                / n;
            cells[i][j] = Some((cov / (sds[i] * sds[j])).clamp(-1.0, 1.0));
        }
    }
    Correlation::Matrix(CorrelationMatrix { cells })
}

fn column(series: &BiorhythmSeries, cycle: Cycle) -> Vec<f64> {
    series
        .points
        .iter()
        .map(|p| match cycle {
            Cycle::Physical => p.physical,
            Cycle::Emotional => p.emotional,
            Cycle::Intellectual => p.intellectual,
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn pop_std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn cycle_stats(values: &[f64]) -> CycleStats {
    let m = mean(values);
    CycleStats {
        mean: m,
        std_dev: pop_std_dev(values, m),
        min: values.iter().cloned().fold(f64::INFINITY, f64::min),
        max: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        count: values.len(),
    }
}
