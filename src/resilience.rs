// Extremity scoring and the climate-resilience ranking.
use crate::util::round_to;
use crate::views::CropEnvRecord;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A closed normal band with optionally open ends. A value is extreme when
/// it falls below the low bound or above the high bound; a missing bound
/// never flags on that side.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Band {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl Band {
    pub fn new(low: f64, high: f64) -> Self {
        Band {
            low: Some(low),
            high: Some(high),
        }
    }

    pub fn above(high: f64) -> Self {
        Band {
            low: None,
            high: Some(high),
        }
    }

    pub fn is_extreme(&self, value: f64) -> bool {
        self.low.map_or(false, |lo| value < lo) || self.high.map_or(false, |hi| value > hi)
    }
}

/// The three per-axis normal bands used by the extremity score.
///
/// The source carries two materially different threshold sets for the same
/// metrics (the second one's temperature range suggests a unit mismatch
/// upstream). Neither is authoritative, so both ship as named presets and
/// the caller must pick one explicitly, or supply custom bands via the
/// config file.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ExtremityBands {
    pub pollution: Band,
    pub temperature: Band,
    pub precipitation: Band,
}

impl ExtremityBands {
    pub fn baseline() -> Self {
        ExtremityBands {
            pollution: Band::new(15.0, 35.0),
            temperature: Band::new(15.0, 25.0),
            precipitation: Band::new(400.0, 900.0),
        }
    }

    pub fn alternate() -> Self {
        ExtremityBands {
            pollution: Band::above(16.0),
            temperature: Band::new(20.0, 80.0),
            precipitation: Band::new(0.01, 0.16),
        }
    }
}

/// Count the axes on which the record falls outside its normal band.
/// Always in [0,3]; a missing axis value never flags.
pub fn extreme_score(record: &CropEnvRecord, bands: &ExtremityBands) -> u8 {
    let mut score = 0u8;
    if record.pollution.map_or(false, |v| bands.pollution.is_extreme(v)) {
        score += 1;
    }
    if record
        .average_temp
        .map_or(false, |v| bands.temperature.is_extreme(v))
    {
        score += 1;
    }
    if record
        .avg_precip
        .map_or(false, |v| bands.precipitation.is_extreme(v))
    {
        score += 1;
    }
    score
}

#[derive(Debug, Clone)]
pub struct CropResilience {
    pub crop: String,
    /// Absent when none of the qualifying records carried a yield value.
    pub avg_yield_in_extremes: Option<f64>,
    pub qualifying: usize,
}

/// The ranking plus how many crops the minimum-sample guard suppressed.
#[derive(Debug)]
pub struct ResilienceRanking {
    pub rows: Vec<CropResilience>,
    pub excluded_by_guard: usize,
}

/// Filter records to extreme exposure (score >= 2), group by crop, and
/// average yield over the filtered subset. A crop with exactly one
/// qualifying record is suppressed rather than reported from a single
/// point; it is counted in `excluded_by_guard`. Rows come back sorted
/// descending by the rounded mean (ties by crop name ascending), so the
/// first row is the most climate-resilient crop.
pub fn resilience_ranking(records: &[CropEnvRecord], bands: &ExtremityBands) -> ResilienceRanking {
    #[derive(Default)]
    struct Acc {
        qualifying: usize,
        yield_sum: f64,
        yield_count: usize,
    }

    let mut by_crop: BTreeMap<&str, Acc> = BTreeMap::new();
    for record in records {
        let acc = by_crop.entry(record.crop.as_str()).or_default();
        if extreme_score(record, bands) >= 2 {
            acc.qualifying += 1;
            if let Some(y) = record.yield_kg_per_acre {
                acc.yield_sum += y;
                acc.yield_count += 1;
            }
        }
    }

    let mut excluded_by_guard = 0usize;
    let mut rows: Vec<CropResilience> = Vec::new();
    for (crop, acc) in by_crop {
        // The guard suppresses only the single-point case. A crop with
        // enough qualifying records but no non-null yields among them is
        // still emitted, with the mean absent.
        if acc.qualifying == 1 {
            excluded_by_guard += 1;
            continue;
        }
        if acc.qualifying > 1 {
            let avg = (acc.yield_count > 0).then(|| acc.yield_sum / acc.yield_count as f64);
            rows.push(CropResilience {
                crop: crop.to_string(),
                avg_yield_in_extremes: avg,
                qualifying: acc.qualifying,
            });
        }
    }

    // Descending by the rounded mean; crops without a mean sort last.
    rows.sort_by(|a, b| {
        match (a.avg_yield_in_extremes, b.avg_yield_in_extremes) {
            (Some(x), Some(y)) => round_to(y, 2)
                .partial_cmp(&round_to(x, 2))
                .unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| a.crop.cmp(&b.crop))
    });

    ResilienceRanking {
        rows,
        excluded_by_guard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(
        crop: &str,
        y: Option<f64>,
        pollution: Option<f64>,
        temp: Option<f64>,
        precip: Option<f64>,
    ) -> CropEnvRecord {
        CropEnvRecord {
            year: 2020,
            state: "TEXAS".into(),
            crop: crop.into(),
            yield_kg_per_acre: y,
            avg_co: None,
            avg_no2: None,
            avg_so2: None,
            avg_o3: None,
            pollution,
            average_temp: temp,
            avg_precip: precip,
        }
    }

    #[test]
    fn score_counts_each_axis_once() {
        let bands = ExtremityBands::baseline();
        let calm = record("corn", Some(1.0), Some(20.0), Some(20.0), Some(500.0));
        assert_eq!(extreme_score(&calm, &bands), 0);
        let harsh = record("corn", Some(1.0), Some(40.0), Some(30.0), Some(1000.0));
        assert_eq!(extreme_score(&harsh, &bands), 3);
        let mixed = record("corn", Some(1.0), Some(10.0), Some(20.0), Some(950.0));
        assert_eq!(extreme_score(&mixed, &bands), 2);
    }

    #[test]
    fn missing_axis_never_flags() {
        let bands = ExtremityBands::baseline();
        let sparse = record("corn", Some(1.0), None, None, None);
        assert_eq!(extreme_score(&sparse, &bands), 0);
    }

    #[test]
    fn open_ended_band_flags_only_one_side() {
        let band = Band::above(16.0);
        assert!(!band.is_extreme(0.0));
        assert!(!band.is_extreme(16.0));
        assert!(band.is_extreme(16.5));
    }

    #[test]
    fn sample_guard_excludes_single_point_crops() {
        let bands = ExtremityBands::baseline();
        let extreme = |crop: &str, y: f64| record(crop, Some(y), Some(40.0), Some(30.0), None);
        let records = vec![
            extreme("corn", 100.0),
            extreme("corn", 80.0),
            extreme("wheat", 500.0), // only one qualifying observation
        ];
        let ranking = resilience_ranking(&records, &bands);
        assert_eq!(ranking.rows.len(), 1);
        assert_eq!(ranking.rows[0].crop, "corn");
        assert_relative_eq!(ranking.rows[0].avg_yield_in_extremes.unwrap(), 90.0);
        assert_eq!(ranking.excluded_by_guard, 1);
    }

    #[test]
    fn crops_with_only_null_yields_are_emitted_without_a_mean() {
        let bands = ExtremityBands::baseline();
        let extreme = |crop: &str, y: Option<f64>| record(crop, y, Some(40.0), Some(30.0), None);
        let records = vec![
            extreme("corn", Some(100.0)),
            extreme("corn", Some(80.0)),
            extreme("wheat", None),
            extreme("wheat", None),
        ];
        let ranking = resilience_ranking(&records, &bands);
        assert_eq!(ranking.excluded_by_guard, 0);
        assert_eq!(ranking.rows.len(), 2);
        assert_eq!(ranking.rows[0].crop, "corn");
        assert_eq!(ranking.rows[1].crop, "wheat");
        assert_eq!(ranking.rows[1].avg_yield_in_extremes, None);
        assert_eq!(ranking.rows[1].qualifying, 2);
    }

    #[test]
    fn ranking_sorts_descending_by_rounded_mean() {
        let bands = ExtremityBands::baseline();
        let extreme = |crop: &str, y: f64| record(crop, Some(y), Some(40.0), Some(30.0), None);
        let records = vec![
            extreme("barley", 50.0),
            extreme("barley", 50.0),
            extreme("corn", 90.0),
            extreme("corn", 90.0),
        ];
        let ranking = resilience_ranking(&records, &bands);
        assert_eq!(ranking.rows[0].crop, "corn");
        assert_eq!(ranking.rows[1].crop, "barley");
    }

    #[test]
    fn low_score_records_never_qualify() {
        let bands = ExtremityBands::baseline();
        // Only one extreme axis: score 1, below the threshold.
        let records = vec![
            record("corn", Some(100.0), Some(40.0), Some(20.0), Some(500.0)),
            record("corn", Some(80.0), Some(40.0), Some(20.0), Some(500.0)),
        ];
        let ranking = resilience_ranking(&records, &bands);
        assert!(ranking.rows.is_empty());
        assert_eq!(ranking.excluded_by_guard, 0);
    }
}
