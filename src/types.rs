use serde::{Deserialize, Serialize};
use tabled::Tabled;

// ---------------------------------------------------------------------------
// Raw CSV rows, one struct per source file.
//
// Every field is `Option<String>` so a malformed cell never fails
// deserialization; the loader decides per field whether a bad value skips
// the row (key columns) or degrades to `None` (metric columns).
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RawCropRow {
    pub state: Option<String>,
    pub year: Option<String>,
    pub season: Option<String>,
    pub crop: Option<String>,
    pub yield_kg_per_acre: Option<String>,
}

/// The pollution source keeps its original headers ("CO Mean" etc.), hence
/// the renames.
#[derive(Debug, Deserialize)]
pub struct RawPollutionRow {
    #[serde(rename = "State")]
    pub state: Option<String>,
    #[serde(rename = "Year")]
    pub year: Option<String>,
    #[serde(rename = "Season")]
    pub season: Option<String>,
    #[serde(rename = "CO Mean")]
    pub co: Option<String>,
    #[serde(rename = "NO2 Mean")]
    pub no2: Option<String>,
    #[serde(rename = "SO2 Mean")]
    pub so2: Option<String>,
    #[serde(rename = "O3 Mean")]
    pub o3: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawTemperatureRow {
    pub state: Option<String>,
    pub year: Option<String>,
    pub season: Option<String>,
    pub average_temp: Option<String>,
}

/// Precipitation events carry a start date instead of a year column; the
/// loader derives the year from it.
#[derive(Debug, Deserialize)]
pub struct RawPrecipitationRow {
    pub state: Option<String>,
    pub season: Option<String>,
    pub start_date: Option<String>,
    pub precipitation: Option<String>,
}

// ---------------------------------------------------------------------------
// Clean, typed observations. State is canonical uppercase and season is
// canonical word-capitalized by the time these exist. Metric fields stay
// `Option` so a missing value is excluded from means rather than treated
// as zero.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CropObservation {
    pub year: i32,
    pub state: String,
    pub season: Option<String>,
    pub crop: String,
    pub yield_kg_per_acre: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PollutionObservation {
    pub year: i32,
    pub state: String,
    pub season: Option<String>,
    pub co: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub o3: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TemperatureObservation {
    pub year: i32,
    pub state: String,
    pub season: Option<String>,
    pub average_temp: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PrecipitationObservation {
    pub year: i32,
    pub state: String,
    pub season: Option<String>,
    pub precipitation: Option<f64>,
}

/// One loaded snapshot of all four sources. Immutable once built; reloading
/// produces a fresh `Dataset` and drops every cached view derived from the
/// old one.
#[derive(Debug, Default)]
pub struct Dataset {
    pub crop: Vec<CropObservation>,
    pub pollution: Vec<PollutionObservation>,
    pub temperature: Vec<TemperatureObservation>,
    pub precipitation: Vec<PrecipitationObservation>,
}

// ---------------------------------------------------------------------------
// Report rows. Numeric cells are pre-formatted strings (fixed decimals,
// empty string for an unmatched secondary source) so the CSV writer and the
// console preview render identically. Column names follow the source
// queries' output aliases.
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct StateSummaryRow {
    pub state: String,
    pub avg_co: String,
    pub avg_no2: String,
    pub avg_so2: String,
    pub avg_o3: String,
    pub avg_precipitation: String,
    pub avg_temp: String,
    pub dominant_crop: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct StateSeasonSummaryRow {
    pub state: String,
    pub season: String,
    pub avg_co: String,
    pub avg_no2: String,
    pub avg_so2: String,
    pub avg_o3: String,
    pub avg_precipitation: String,
    pub avg_temp: String,
    pub dominant_crop: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct YearStateSummaryRow {
    pub year: i32,
    pub state: String,
    pub avg_co: String,
    pub avg_no2: String,
    pub avg_so2: String,
    pub avg_o3: String,
    pub avg_precipitation: String,
    pub avg_temp: String,
    pub dominant_crop: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct YieldEnvironmentRow {
    pub year: i32,
    pub state: String,
    pub avg_yield: String,
    pub avg_co: String,
    pub avg_no2: String,
    pub avg_so2: String,
    pub avg_o3: String,
    pub avg_precipitation: String,
    pub avg_temp: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BestConditionsRow {
    pub crop: String,
    pub best_pollution: String,
    pub best_temp: String,
    pub best_precip: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BestCropByStateRow {
    pub state: String,
    pub best_crop_to_plant: String,
    pub avg_yield_kg_per_acre: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BestCropByPollutionRow {
    pub pollution_group: String,
    pub crop: String,
    pub avg_yield: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BestCropByTemperatureRow {
    pub temp_group: String,
    pub crop: String,
    pub avg_yield: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BestCropByPrecipitationRow {
    pub precip_group: String,
    pub crop: String,
    pub avg_yield: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BestCropStatePollutionRow {
    pub state: String,
    pub best_crop_by_pollution: String,
    pub avg_yield_kg_per_acre: String,
    pub avg_co: String,
    pub avg_no2: String,
    pub avg_so2: String,
    pub avg_o3: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BestCropStateTemperatureRow {
    pub state: String,
    pub crop: String,
    pub avg_yield: String,
    pub avg_temp: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BestCropStatePrecipitationRow {
    pub state: String,
    pub crop: String,
    pub avg_yield: String,
    pub avg_precip: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BestCropBySeasonRow {
    pub season: String,
    pub best_crop: String,
    pub avg_yield_kg_per_acre: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BestSeasonByCropRow {
    pub crop: String,
    pub best_season_to_plant: String,
    pub avg_yield_kg_per_acre: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ResilienceRow {
    pub crop: String,
    pub avg_yield_in_extremes: String,
}

/// Run-level statistics written to `summary.json`.
#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub crop_observations: usize,
    pub pollution_observations: usize,
    pub temperature_observations: usize,
    pub precipitation_observations: usize,
    pub distinct_states: usize,
    pub distinct_crops: usize,
    pub mean_yield: f64,
    pub median_yield: f64,
    pub states_with_dominant_crop: usize,
}
