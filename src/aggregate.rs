// Group-by-mean aggregation over typed observation sets.
use crate::error::ReportError;
use crate::tier::Tier;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// An ordered tuple of grouping attributes. The populated subset defines
/// the key shape ({state}, {state,season}, {year,state}, {crop}, ...).
///
/// Constructors take raw strings and normalize them, so two spellings of
/// the same state always produce equal keys. The derived `Ord` compares
/// state, then year, then season, then crop, which matches the sort order
/// every report uses for its primary source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateKey {
    pub state: Option<String>,
    pub year: Option<i32>,
    pub season: Option<String>,
    pub crop: Option<String>,
    pub tier: Option<Tier>,
}

impl AggregateKey {
    fn empty() -> Self {
        AggregateKey {
            state: None,
            year: None,
            season: None,
            crop: None,
            tier: None,
        }
    }

    pub fn state(state: &str) -> Self {
        AggregateKey {
            state: Some(state.trim().to_uppercase()),
            ..Self::empty()
        }
    }

    pub fn state_season(state: &str, season: &str) -> Self {
        AggregateKey {
            season: Some(season.to_string()),
            ..Self::state(state)
        }
    }

    pub fn year_state(year: i32, state: &str) -> Self {
        AggregateKey {
            year: Some(year),
            ..Self::state(state)
        }
    }

    pub fn crop(crop: &str) -> Self {
        AggregateKey {
            crop: Some(crop.to_string()),
            ..Self::empty()
        }
    }

    pub fn state_crop(state: &str, crop: &str) -> Self {
        AggregateKey {
            crop: Some(crop.to_string()),
            ..Self::state(state)
        }
    }

    pub fn season_crop(season: &str, crop: &str) -> Self {
        AggregateKey {
            season: Some(season.to_string()),
            crop: Some(crop.to_string()),
            ..Self::empty()
        }
    }

    pub fn tier(tier: Tier) -> Self {
        AggregateKey {
            tier: Some(tier),
            ..Self::empty()
        }
    }

    pub fn tier_crop(tier: Tier, crop: &str) -> Self {
        AggregateKey {
            crop: Some(crop.to_string()),
            ..Self::tier(tier)
        }
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if let Some(y) = self.year {
            parts.push(y.to_string());
        }
        if let Some(s) = &self.state {
            parts.push(s.clone());
        }
        if let Some(s) = &self.season {
            parts.push(s.clone());
        }
        if let Some(c) = &self.crop {
            parts.push(c.clone());
        }
        if let Some(t) = &self.tier {
            parts.push(t.to_string());
        }
        if parts.is_empty() {
            return f.write_str("(empty key)");
        }
        f.write_str(&parts.join(" / "))
    }
}

/// A key plus the mean of each requested metric over all observations with
/// that key, plus string tags attached later (e.g. a dominant-crop label).
/// A metric appears only if at least one observation supplied a value for
/// it; a key with zero observations never appears at all.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub key: AggregateKey,
    pub metrics: BTreeMap<String, f64>,
    pub tags: BTreeMap<String, String>,
}

impl AggregateRow {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }
}

/// A named metric accessor over an observation type. Returning `None`
/// excludes that observation from this metric's mean without affecting the
/// others.
pub struct Metric<T> {
    pub name: &'static str,
    pub get: fn(&T) -> Option<f64>,
}

/// Group `rows` by `key_of` and compute the unweighted arithmetic mean of
/// every metric per group. Rows for which `key_of` returns `None` (e.g. a
/// missing season under a season-keyed shape) are excluded from the
/// grouping entirely. The output is sorted by key, so identical inputs
/// always produce identical row order. An empty input yields an empty row
/// set, not an error.
pub fn aggregate<T>(
    rows: &[T],
    key_of: impl Fn(&T) -> Option<AggregateKey>,
    metrics: &[Metric<T>],
) -> Vec<AggregateRow> {
    let mut groups: HashMap<AggregateKey, Vec<(f64, usize)>> = HashMap::new();
    for row in rows {
        let Some(key) = key_of(row) else { continue };
        let acc = groups
            .entry(key)
            .or_insert_with(|| vec![(0.0, 0); metrics.len()]);
        for (slot, metric) in acc.iter_mut().zip(metrics) {
            if let Some(v) = (metric.get)(row) {
                slot.0 += v;
                slot.1 += 1;
            }
        }
    }

    let mut out: Vec<AggregateRow> = groups
        .into_iter()
        .map(|(key, acc)| {
            let mut means = BTreeMap::new();
            for (metric, (sum, count)) in metrics.iter().zip(acc) {
                if count > 0 {
                    means.insert(metric.name.to_string(), sum / count as f64);
                }
            }
            AggregateRow {
                key,
                metrics: means,
                tags: BTreeMap::new(),
            }
        })
        .collect();
    out.sort_by(|a, b| a.key.cmp(&b.key));
    out
}

/// Resolve a key to its aggregate row. For callers that treat an absent
/// group as an error (the state lookup) rather than a missing row.
pub fn lookup<'a>(
    rows: &'a [AggregateRow],
    key: &AggregateKey,
) -> Result<&'a AggregateRow, ReportError> {
    rows.iter()
        .find(|r| &r.key == key)
        .ok_or_else(|| ReportError::EmptyGroup {
            key: key.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CropObservation;
    use approx::assert_relative_eq;

    fn obs(state: &str, year: i32, crop: &str, y: Option<f64>) -> CropObservation {
        CropObservation {
            year,
            state: state.to_string(),
            season: None,
            crop: crop.to_string(),
            yield_kg_per_acre: y,
        }
    }

    const YIELD: Metric<CropObservation> = Metric {
        name: "avg_yield",
        get: |c| c.yield_kg_per_acre,
    };

    #[test]
    fn case_variants_merge_into_one_group() {
        let rows = vec![
            obs("texas", 2020, "corn", Some(100.0)),
            obs("Texas", 2020, "corn", Some(200.0)),
            obs("TEXAS", 2020, "corn", Some(300.0)),
        ];
        let agg = aggregate(&rows, |c| Some(AggregateKey::state(&c.state)), &[YIELD]);
        assert_eq!(agg.len(), 1);
        assert_eq!(agg[0].key.state.as_deref(), Some("TEXAS"));
        assert_relative_eq!(agg[0].metric("avg_yield").unwrap(), 200.0);
    }

    #[test]
    fn missing_metric_values_are_excluded_not_zero() {
        let rows = vec![
            obs("TX", 2020, "corn", Some(100.0)),
            obs("TX", 2020, "corn", None),
            obs("TX", 2020, "corn", Some(50.0)),
        ];
        let agg = aggregate(&rows, |c| Some(AggregateKey::state(&c.state)), &[YIELD]);
        assert_relative_eq!(agg[0].metric("avg_yield").unwrap(), 75.0);
    }

    #[test]
    fn all_missing_metric_leaves_no_entry() {
        let rows = vec![obs("TX", 2020, "corn", None)];
        let agg = aggregate(&rows, |c| Some(AggregateKey::state(&c.state)), &[YIELD]);
        assert_eq!(agg.len(), 1);
        assert_eq!(agg[0].metric("avg_yield"), None);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let rows: Vec<CropObservation> = vec![];
        let agg = aggregate(&rows, |c| Some(AggregateKey::state(&c.state)), &[YIELD]);
        assert!(agg.is_empty());
    }

    #[test]
    fn singleton_mean_is_idempotent() {
        let rows = vec![obs("TX", 2020, "corn", Some(123.45))];
        let agg = aggregate(&rows, |c| Some(AggregateKey::state(&c.state)), &[YIELD]);
        assert_relative_eq!(agg[0].metric("avg_yield").unwrap(), 123.45);
    }

    #[test]
    fn rows_without_a_key_component_are_skipped() {
        let rows = vec![
            CropObservation {
                year: 2020,
                state: "TX".into(),
                season: Some("Winter".into()),
                crop: "corn".into(),
                yield_kg_per_acre: Some(10.0),
            },
            obs("TX", 2020, "corn", Some(99.0)),
        ];
        let agg = aggregate(
            &rows,
            |c| {
                c.season
                    .as_deref()
                    .map(|s| AggregateKey::state_season(&c.state, s))
            },
            &[YIELD],
        );
        assert_eq!(agg.len(), 1);
        assert_relative_eq!(agg[0].metric("avg_yield").unwrap(), 10.0);
    }

    #[test]
    fn lookup_reports_empty_group_for_absent_key() {
        let rows = vec![obs("TX", 2020, "corn", Some(1.0))];
        let agg = aggregate(&rows, |c| Some(AggregateKey::state(&c.state)), &[YIELD]);
        assert!(lookup(&agg, &AggregateKey::state("TX")).is_ok());
        let err = lookup(&agg, &AggregateKey::state("Atlantis")).unwrap_err();
        assert!(matches!(err, ReportError::EmptyGroup { .. }));
    }

    #[test]
    fn output_is_sorted_by_key() {
        let rows = vec![
            obs("WYOMING", 2020, "corn", Some(1.0)),
            obs("ALABAMA", 2020, "corn", Some(1.0)),
            obs("IOWA", 2020, "corn", Some(1.0)),
        ];
        let agg = aggregate(&rows, |c| Some(AggregateKey::state(&c.state)), &[YIELD]);
        let states: Vec<&str> = agg.iter().filter_map(|r| r.key.state.as_deref()).collect();
        assert_eq!(states, vec!["ALABAMA", "IOWA", "WYOMING"]);
    }
}
