// Cached per-source aggregates, mirroring the materialized views the
// report queries share. Every view is derived and disposable: reloading
// the input files replaces the whole `Views` value, and recomputing any
// view from the dataset is always safe.
use crate::aggregate::{aggregate, AggregateKey, AggregateRow, Metric};
use crate::error::ReportError;
use crate::rank::{select_best, Candidate, TieBreak};
use crate::types::{
    CropObservation, Dataset, PollutionObservation, PrecipitationObservation,
    TemperatureObservation,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

// Metric and tag names as they appear in view rows and report columns.
pub const AVG_YIELD: &str = "avg_yield";
pub const AVG_CO: &str = "avg_co";
pub const AVG_NO2: &str = "avg_no2";
pub const AVG_SO2: &str = "avg_so2";
pub const AVG_O3: &str = "avg_o3";
pub const AVG_PRECIPITATION: &str = "avg_precipitation";
pub const AVG_TEMP: &str = "avg_temp";
pub const DOMINANT_CROP: &str = "dominant_crop";

/// Inclusive year range filter applied by the year-keyed views.
pub type YearRange = (i32, i32);

fn in_range(year: i32, range: YearRange) -> bool {
    year >= range.0 && year <= range.1
}

/// One crop observation joined (left) to its year/state environment
/// aggregates. The pollution composite is the sum of the four component
/// means and is defined only when all four are present; any axis a record
/// lacks simply stays `None`.
#[derive(Debug, Clone)]
pub struct CropEnvRecord {
    pub year: i32,
    pub state: String,
    pub crop: String,
    pub yield_kg_per_acre: Option<f64>,
    pub avg_co: Option<f64>,
    pub avg_no2: Option<f64>,
    pub avg_so2: Option<f64>,
    pub avg_o3: Option<f64>,
    pub pollution: Option<f64>,
    pub average_temp: Option<f64>,
    pub avg_precip: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ViewKey {
    PollutionByState(YearRange),
    WeatherByState(YearRange),
    TemperatureByState(YearRange),
    CropSummaryByState(YearRange),
    PollutionByStateSeason,
    WeatherByStateSeason,
    TemperatureByStateSeason,
    CropSummaryByStateSeason,
    PollutionByYearState(YearRange),
    WeatherByYearState(YearRange),
    TemperatureByYearState(YearRange),
    CropSummaryByYearState(YearRange),
    CropYearly(YearRange),
}

/// Memoized named aggregates over one loaded dataset.
///
/// Each accessor computes its rows on first use and hands out the cached
/// `Arc` thereafter. The dominant-crop views run the rank selector, so
/// they inherit the configured tie-break policy and can fail under the
/// strict variant.
pub struct Views {
    data: Arc<Dataset>,
    tie_break: TieBreak,
    aggregates: HashMap<ViewKey, Arc<Vec<AggregateRow>>>,
    crop_env: HashMap<YearRange, Arc<Vec<CropEnvRecord>>>,
}

fn pollution_metrics() -> Vec<Metric<PollutionObservation>> {
    vec![
        Metric { name: AVG_CO, get: |p| p.co },
        Metric { name: AVG_NO2, get: |p| p.no2 },
        Metric { name: AVG_SO2, get: |p| p.so2 },
        Metric { name: AVG_O3, get: |p| p.o3 },
    ]
}

fn precipitation_metrics() -> Vec<Metric<PrecipitationObservation>> {
    vec![Metric { name: AVG_PRECIPITATION, get: |w| w.precipitation }]
}

fn temperature_metrics() -> Vec<Metric<TemperatureObservation>> {
    vec![Metric { name: AVG_TEMP, get: |t| t.average_temp }]
}

fn yield_metric() -> Vec<Metric<CropObservation>> {
    vec![Metric { name: AVG_YIELD, get: |c| c.yield_kg_per_acre }]
}

impl Views {
    pub fn new(data: Arc<Dataset>, tie_break: TieBreak) -> Self {
        Views {
            data,
            tie_break,
            aggregates: HashMap::new(),
            crop_env: HashMap::new(),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    fn cached(
        &mut self,
        key: ViewKey,
        build: impl FnOnce(&Dataset) -> Vec<AggregateRow>,
    ) -> Arc<Vec<AggregateRow>> {
        if let Some(rows) = self.aggregates.get(&key) {
            return Arc::clone(rows);
        }
        let data = Arc::clone(&self.data);
        let rows = Arc::new(build(&data));
        self.aggregates.insert(key, Arc::clone(&rows));
        rows
    }

    // --- state-keyed views -------------------------------------------------
    //
    // The state-level views filter to a year window before averaging, the
    // same way the year/state views do; the state summary and the state
    // lookup both run them over 2016-2022.

    pub fn pollution_by_state(&mut self, range: YearRange) -> Arc<Vec<AggregateRow>> {
        self.cached(ViewKey::PollutionByState(range), move |data| {
            aggregate(
                &data.pollution,
                |p| in_range(p.year, range).then(|| AggregateKey::state(&p.state)),
                &pollution_metrics(),
            )
        })
    }

    pub fn weather_by_state(&mut self, range: YearRange) -> Arc<Vec<AggregateRow>> {
        self.cached(ViewKey::WeatherByState(range), move |data| {
            aggregate(
                &data.precipitation,
                |w| in_range(w.year, range).then(|| AggregateKey::state(&w.state)),
                &precipitation_metrics(),
            )
        })
    }

    pub fn temperature_by_state(&mut self, range: YearRange) -> Arc<Vec<AggregateRow>> {
        self.cached(ViewKey::TemperatureByState(range), move |data| {
            aggregate(
                &data.temperature,
                |t| in_range(t.year, range).then(|| AggregateKey::state(&t.state)),
                &temperature_metrics(),
            )
        })
    }

    pub fn crop_summary_by_state(
        &mut self,
        range: YearRange,
    ) -> Result<Arc<Vec<AggregateRow>>, ReportError> {
        self.dominant_crop_view(ViewKey::CropSummaryByState(range), move |c| {
            in_range(c.year, range).then(|| AggregateKey::state_crop(&c.state, &c.crop))
        })
    }

    // --- state+season views ------------------------------------------------

    pub fn pollution_by_state_season(&mut self) -> Arc<Vec<AggregateRow>> {
        self.cached(ViewKey::PollutionByStateSeason, |data| {
            aggregate(
                &data.pollution,
                |p| {
                    p.season
                        .as_deref()
                        .map(|s| AggregateKey::state_season(&p.state, s))
                },
                &pollution_metrics(),
            )
        })
    }

    pub fn weather_by_state_season(&mut self) -> Arc<Vec<AggregateRow>> {
        self.cached(ViewKey::WeatherByStateSeason, |data| {
            aggregate(
                &data.precipitation,
                |w| {
                    w.season
                        .as_deref()
                        .map(|s| AggregateKey::state_season(&w.state, s))
                },
                &precipitation_metrics(),
            )
        })
    }

    pub fn temperature_by_state_season(&mut self) -> Arc<Vec<AggregateRow>> {
        self.cached(ViewKey::TemperatureByStateSeason, |data| {
            aggregate(
                &data.temperature,
                |t| {
                    t.season
                        .as_deref()
                        .map(|s| AggregateKey::state_season(&t.state, s))
                },
                &temperature_metrics(),
            )
        })
    }

    pub fn crop_summary_by_state_season(&mut self) -> Result<Arc<Vec<AggregateRow>>, ReportError> {
        self.dominant_crop_view(ViewKey::CropSummaryByStateSeason, |c| {
            c.season.as_deref().map(|s| AggregateKey {
                season: Some(s.to_string()),
                ..AggregateKey::state_crop(&c.state, &c.crop)
            })
        })
    }

    // --- year+state views --------------------------------------------------

    pub fn pollution_by_year_state(&mut self, range: YearRange) -> Arc<Vec<AggregateRow>> {
        self.cached(ViewKey::PollutionByYearState(range), move |data| {
            aggregate(
                &data.pollution,
                |p| in_range(p.year, range).then(|| AggregateKey::year_state(p.year, &p.state)),
                &pollution_metrics(),
            )
        })
    }

    pub fn weather_by_year_state(&mut self, range: YearRange) -> Arc<Vec<AggregateRow>> {
        self.cached(ViewKey::WeatherByYearState(range), move |data| {
            aggregate(
                &data.precipitation,
                |w| in_range(w.year, range).then(|| AggregateKey::year_state(w.year, &w.state)),
                &precipitation_metrics(),
            )
        })
    }

    pub fn temperature_by_year_state(&mut self, range: YearRange) -> Arc<Vec<AggregateRow>> {
        self.cached(ViewKey::TemperatureByYearState(range), move |data| {
            aggregate(
                &data.temperature,
                |t| in_range(t.year, range).then(|| AggregateKey::year_state(t.year, &t.state)),
                &temperature_metrics(),
            )
        })
    }

    pub fn crop_summary_by_year_state(
        &mut self,
        range: YearRange,
    ) -> Result<Arc<Vec<AggregateRow>>, ReportError> {
        self.dominant_crop_view(ViewKey::CropSummaryByYearState(range), move |c| {
            in_range(c.year, range).then(|| AggregateKey {
                crop: Some(c.crop.clone()),
                ..AggregateKey::year_state(c.year, &c.state)
            })
        })
    }

    pub fn crop_yearly(&mut self, range: YearRange) -> Arc<Vec<AggregateRow>> {
        self.cached(ViewKey::CropYearly(range), move |data| {
            aggregate(
                &data.crop,
                |c| in_range(c.year, range).then(|| AggregateKey::year_state(c.year, &c.state)),
                &yield_metric(),
            )
        })
    }

    // --- derived views -----------------------------------------------------

    /// Aggregate mean yield per crop-bearing key, then keep the winning
    /// crop per remaining key as a `dominant_crop` tag. This is the
    /// `crop_summary` view family.
    fn dominant_crop_view(
        &mut self,
        key: ViewKey,
        key_of: impl Fn(&CropObservation) -> Option<AggregateKey>,
    ) -> Result<Arc<Vec<AggregateRow>>, ReportError> {
        if let Some(rows) = self.aggregates.get(&key) {
            return Ok(Arc::clone(rows));
        }
        let data = Arc::clone(&self.data);
        let per_crop = aggregate(&data.crop, key_of, &yield_metric());
        let candidates: Vec<Candidate<()>> = per_crop
            .into_iter()
            .filter_map(|row| {
                let score = row.metric(AVG_YIELD)?;
                let mut partition = row.key;
                let label = partition.crop.take()?;
                Some(Candidate {
                    partition,
                    label,
                    score,
                    value: (),
                })
            })
            .collect();
        let winners = select_best(candidates, self.tie_break)?;
        let rows: Vec<AggregateRow> = winners
            .into_iter()
            .map(|w| {
                let mut metrics = BTreeMap::new();
                metrics.insert(AVG_YIELD.to_string(), w.score);
                let mut tags = BTreeMap::new();
                tags.insert(DOMINANT_CROP.to_string(), w.label);
                AggregateRow {
                    key: w.partition,
                    metrics,
                    tags,
                }
            })
            .collect();
        let rows = Arc::new(rows);
        self.aggregates.insert(key, Arc::clone(&rows));
        Ok(rows)
    }

    /// One record per crop observation within the range, left-joined to the
    /// year/state pollution, temperature and precipitation aggregates.
    pub fn crop_environment(&mut self, range: YearRange) -> Arc<Vec<CropEnvRecord>> {
        if let Some(rows) = self.crop_env.get(&range) {
            return Arc::clone(rows);
        }
        let pollution = self.pollution_by_year_state(range);
        let temperature = self.temperature_by_year_state(range);
        let precipitation = self.weather_by_year_state(range);
        let pollution_ix: HashMap<&AggregateKey, &AggregateRow> =
            pollution.iter().map(|r| (&r.key, r)).collect();
        let temperature_ix: HashMap<&AggregateKey, &AggregateRow> =
            temperature.iter().map(|r| (&r.key, r)).collect();
        let precipitation_ix: HashMap<&AggregateKey, &AggregateRow> =
            precipitation.iter().map(|r| (&r.key, r)).collect();

        let data = Arc::clone(&self.data);
        let records: Vec<CropEnvRecord> = data
            .crop
            .iter()
            .filter(|c| in_range(c.year, range))
            .map(|c| {
                let key = AggregateKey::year_state(c.year, &c.state);
                let p = pollution_ix.get(&key).copied();
                let avg_co = p.and_then(|r| r.metric(AVG_CO));
                let avg_no2 = p.and_then(|r| r.metric(AVG_NO2));
                let avg_so2 = p.and_then(|r| r.metric(AVG_SO2));
                let avg_o3 = p.and_then(|r| r.metric(AVG_O3));
                let pollution = match (avg_co, avg_no2, avg_so2, avg_o3) {
                    (Some(co), Some(no2), Some(so2), Some(o3)) => Some(co + no2 + so2 + o3),
                    _ => None,
                };
                CropEnvRecord {
                    year: c.year,
                    state: c.state.clone(),
                    crop: c.crop.clone(),
                    yield_kg_per_acre: c.yield_kg_per_acre,
                    avg_co,
                    avg_no2,
                    avg_so2,
                    avg_o3,
                    pollution,
                    average_temp: temperature_ix
                        .get(&key)
                        .and_then(|r| r.metric(AVG_TEMP)),
                    avg_precip: precipitation_ix
                        .get(&key)
                        .and_then(|r| r.metric(AVG_PRECIPITATION)),
                }
            })
            .collect();
        let records = Arc::new(records);
        self.crop_env.insert(range, Arc::clone(&records));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dataset() -> Arc<Dataset> {
        Arc::new(Dataset {
            crop: vec![
                CropObservation {
                    year: 2020,
                    state: "TEXAS".into(),
                    season: Some("Winter".into()),
                    crop: "corn".into(),
                    yield_kg_per_acre: Some(100.0),
                },
                CropObservation {
                    year: 2020,
                    state: "TEXAS".into(),
                    season: Some("Winter".into()),
                    crop: "wheat".into(),
                    yield_kg_per_acre: Some(80.0),
                },
            ],
            pollution: vec![PollutionObservation {
                year: 2020,
                state: "TEXAS".into(),
                season: None,
                co: Some(1.0),
                no2: Some(1.0),
                so2: Some(1.0),
                o3: Some(1.0),
            }],
            temperature: vec![TemperatureObservation {
                year: 2020,
                state: "TEXAS".into(),
                season: None,
                average_temp: Some(21.0),
            }],
            precipitation: vec![],
        })
    }

    #[test]
    fn second_request_returns_the_cached_value() {
        let mut views = Views::new(dataset(), TieBreak::Lexicographic);
        let first = views.pollution_by_state((2016, 2022));
        let second = views.pollution_by_state((2016, 2022));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn dominant_crop_view_tags_the_winner() {
        let mut views = Views::new(dataset(), TieBreak::Lexicographic);
        let summary = views.crop_summary_by_state((2016, 2022)).unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].tag(DOMINANT_CROP), Some("corn"));
        assert_relative_eq!(summary[0].metric(AVG_YIELD).unwrap(), 100.0);
    }

    #[test]
    fn crop_environment_composite_and_missing_axes() {
        let mut views = Views::new(dataset(), TieBreak::Lexicographic);
        let env = views.crop_environment((2016, 2022));
        assert_eq!(env.len(), 2);
        assert_relative_eq!(env[0].pollution.unwrap(), 4.0);
        assert_relative_eq!(env[0].average_temp.unwrap(), 21.0);
        // No precipitation data loaded: the axis stays absent, the record
        // survives.
        assert_eq!(env[0].avg_precip, None);
    }

    #[test]
    fn crop_environment_honors_the_year_range() {
        let mut views = Views::new(dataset(), TieBreak::Lexicographic);
        let env = views.crop_environment((2016, 2019));
        assert!(env.is_empty());
    }
}
