// The fixed report shapes, composed from the aggregation, tiering, ranking
// and join components. No I/O happens here; every generator returns typed
// rows and the caller decides where they go.
//
// Numeric cells are formatted at this layer: 4 decimals for pollutant
// concentrations, 2 for yield, precipitation and temperature. Rounding is
// presentation only and is applied after all averaging.
use crate::aggregate::{aggregate, lookup, AggregateKey, AggregateRow, Metric};
use crate::error::ReportError;
use crate::join::left_join;
use crate::rank::{select_best, Candidate, TieBreak};
use crate::resilience::{resilience_ranking, ExtremityBands};
use crate::tier::{ntile3, Tier};
use crate::types::*;
use crate::util::{average, format_number, median};
use crate::views::{
    CropEnvRecord, Views, AVG_CO, AVG_NO2, AVG_O3, AVG_PRECIPITATION, AVG_SO2, AVG_TEMP,
    AVG_YIELD, DOMINANT_CROP,
};
use std::collections::{BTreeMap, HashSet};

/// Year windows the source queries fix for their filtered reports.
pub const FULL_RANGE: (i32, i32) = (2016, 2022);
pub const YIELD_RANGE: (i32, i32) = (2016, 2021);

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    v.map(|v| format_number(v, decimals)).unwrap_or_default()
}

/// Which key component the rank selector is choosing between; the rest of
/// the key becomes the partition.
enum RankLabel {
    Crop,
    Season,
}

fn winners_by(
    rows: Vec<AggregateRow>,
    label: RankLabel,
    tie_break: TieBreak,
) -> Result<Vec<Candidate<AggregateRow>>, ReportError> {
    let candidates: Vec<Candidate<AggregateRow>> = rows
        .into_iter()
        .filter_map(|row| {
            // Groups with no non-null yield are not rank candidates.
            let score = row.metric(AVG_YIELD)?;
            let mut partition = row.key.clone();
            let label_value = match label {
                RankLabel::Crop => partition.crop.take(),
                RankLabel::Season => partition.season.take(),
            }?;
            Some(Candidate {
                partition,
                label: label_value,
                score,
                value: row,
            })
        })
        .collect();
    select_best(candidates, tie_break)
}

// ---------------------------------------------------------------------------
// Summary reports
// ---------------------------------------------------------------------------

/// Historical averages per state, 2016-2022: pollution (primary),
/// precipitation, temperature and the dominant crop by mean yield.
pub fn state_summary(views: &mut Views) -> Result<Vec<StateSummaryRow>, ReportError> {
    let pollution = views.pollution_by_state(FULL_RANGE);
    let weather = views.weather_by_state(FULL_RANGE);
    let temperature = views.temperature_by_state(FULL_RANGE);
    let crops = views.crop_summary_by_state(FULL_RANGE)?;
    let joined = left_join(&pollution, &[&weather, &temperature, &crops])?;
    Ok(joined
        .iter()
        .map(|j| StateSummaryRow {
            state: j.primary.key.state.clone().unwrap_or_default(),
            avg_co: fmt_opt(j.primary.metric(AVG_CO), 4),
            avg_no2: fmt_opt(j.primary.metric(AVG_NO2), 4),
            avg_so2: fmt_opt(j.primary.metric(AVG_SO2), 4),
            avg_o3: fmt_opt(j.primary.metric(AVG_O3), 4),
            avg_precipitation: fmt_opt(
                j.secondaries[0].and_then(|r| r.metric(AVG_PRECIPITATION)),
                2,
            ),
            avg_temp: fmt_opt(j.secondaries[1].and_then(|r| r.metric(AVG_TEMP)), 2),
            dominant_crop: j.secondaries[2]
                .and_then(|r| r.tag(DOMINANT_CROP))
                .map(str::to_string)
                .unwrap_or_default(),
        })
        .collect())
}

/// Historical averages per (state, season). Rows without a season label are
/// excluded from the grouping.
pub fn state_season_summary(views: &mut Views) -> Result<Vec<StateSeasonSummaryRow>, ReportError> {
    let pollution = views.pollution_by_state_season();
    let weather = views.weather_by_state_season();
    let temperature = views.temperature_by_state_season();
    let crops = views.crop_summary_by_state_season()?;
    let joined = left_join(&pollution, &[&weather, &temperature, &crops])?;
    Ok(joined
        .iter()
        .map(|j| StateSeasonSummaryRow {
            state: j.primary.key.state.clone().unwrap_or_default(),
            season: j.primary.key.season.clone().unwrap_or_default(),
            avg_co: fmt_opt(j.primary.metric(AVG_CO), 4),
            avg_no2: fmt_opt(j.primary.metric(AVG_NO2), 4),
            avg_so2: fmt_opt(j.primary.metric(AVG_SO2), 4),
            avg_o3: fmt_opt(j.primary.metric(AVG_O3), 4),
            avg_precipitation: fmt_opt(
                j.secondaries[0].and_then(|r| r.metric(AVG_PRECIPITATION)),
                2,
            ),
            avg_temp: fmt_opt(j.secondaries[1].and_then(|r| r.metric(AVG_TEMP)), 2),
            dominant_crop: j.secondaries[2]
                .and_then(|r| r.tag(DOMINANT_CROP))
                .map(str::to_string)
                .unwrap_or_default(),
        })
        .collect())
}

/// Historical averages per (year, state), 2016-2022.
pub fn year_state_summary(views: &mut Views) -> Result<Vec<YearStateSummaryRow>, ReportError> {
    let pollution = views.pollution_by_year_state(FULL_RANGE);
    let weather = views.weather_by_year_state(FULL_RANGE);
    let temperature = views.temperature_by_year_state(FULL_RANGE);
    let crops = views.crop_summary_by_year_state(FULL_RANGE)?;
    let joined = left_join(&pollution, &[&weather, &temperature, &crops])?;
    Ok(joined
        .iter()
        .map(|j| YearStateSummaryRow {
            year: j.primary.key.year.unwrap_or_default(),
            state: j.primary.key.state.clone().unwrap_or_default(),
            avg_co: fmt_opt(j.primary.metric(AVG_CO), 4),
            avg_no2: fmt_opt(j.primary.metric(AVG_NO2), 4),
            avg_so2: fmt_opt(j.primary.metric(AVG_SO2), 4),
            avg_o3: fmt_opt(j.primary.metric(AVG_O3), 4),
            avg_precipitation: fmt_opt(
                j.secondaries[0].and_then(|r| r.metric(AVG_PRECIPITATION)),
                2,
            ),
            avg_temp: fmt_opt(j.secondaries[1].and_then(|r| r.metric(AVG_TEMP)), 2),
            dominant_crop: j.secondaries[2]
                .and_then(|r| r.tag(DOMINANT_CROP))
                .map(str::to_string)
                .unwrap_or_default(),
        })
        .collect())
}

/// Mean crop yield per (year, state) beside the same key's environment
/// averages, 2016-2021. Crop yield is the primary source here.
pub fn yield_environment(views: &mut Views) -> Result<Vec<YieldEnvironmentRow>, ReportError> {
    let yields = views.crop_yearly(YIELD_RANGE);
    let pollution = views.pollution_by_year_state(YIELD_RANGE);
    let weather = views.weather_by_year_state(YIELD_RANGE);
    let temperature = views.temperature_by_year_state(YIELD_RANGE);
    let joined = left_join(&yields, &[&pollution, &weather, &temperature])?;
    Ok(joined
        .iter()
        .map(|j| YieldEnvironmentRow {
            year: j.primary.key.year.unwrap_or_default(),
            state: j.primary.key.state.clone().unwrap_or_default(),
            avg_yield: fmt_opt(j.primary.metric(AVG_YIELD), 2),
            avg_co: fmt_opt(j.secondaries[0].and_then(|r| r.metric(AVG_CO)), 4),
            avg_no2: fmt_opt(j.secondaries[0].and_then(|r| r.metric(AVG_NO2)), 4),
            avg_so2: fmt_opt(j.secondaries[0].and_then(|r| r.metric(AVG_SO2)), 4),
            avg_o3: fmt_opt(j.secondaries[0].and_then(|r| r.metric(AVG_O3)), 4),
            avg_precipitation: fmt_opt(
                j.secondaries[1].and_then(|r| r.metric(AVG_PRECIPITATION)),
                2,
            ),
            avg_temp: fmt_opt(j.secondaries[2].and_then(|r| r.metric(AVG_TEMP)), 2),
        })
        .collect())
}

/// Run-level statistics for `summary.json`.
pub fn generate_summary(data: &Dataset, state_rows: &[StateSummaryRow]) -> SummaryStats {
    let mut states: HashSet<&str> = HashSet::new();
    states.extend(data.crop.iter().map(|o| o.state.as_str()));
    states.extend(data.pollution.iter().map(|o| o.state.as_str()));
    states.extend(data.temperature.iter().map(|o| o.state.as_str()));
    states.extend(data.precipitation.iter().map(|o| o.state.as_str()));
    let crops: HashSet<&str> = data.crop.iter().map(|o| o.crop.as_str()).collect();
    let yields: Vec<f64> = data
        .crop
        .iter()
        .filter_map(|o| o.yield_kg_per_acre)
        .collect();
    SummaryStats {
        crop_observations: data.crop.len(),
        pollution_observations: data.pollution.len(),
        temperature_observations: data.temperature.len(),
        precipitation_observations: data.precipitation.len(),
        distinct_states: states.len(),
        distinct_crops: crops.len(),
        mean_yield: average(&yields),
        median_yield: median(yields),
        states_with_dominant_crop: state_rows
            .iter()
            .filter(|r| !r.dominant_crop.is_empty())
            .count(),
    }
}

// ---------------------------------------------------------------------------
// Best-crop reports
// ---------------------------------------------------------------------------

/// For one environment axis, tier the records globally and pick the tier
/// whose records gave each crop its highest mean yield.
fn best_tier_per_crop(
    env: &[CropEnvRecord],
    axis: fn(&CropEnvRecord) -> Option<f64>,
    tie_break: TieBreak,
) -> Result<BTreeMap<String, String>, ReportError> {
    let pairs: Vec<(&CropEnvRecord, f64)> = env
        .iter()
        .filter_map(|r| axis(r).map(|v| (r, v)))
        .collect();
    let values: Vec<f64> = pairs.iter().map(|(_, v)| *v).collect();
    let tiers = ntile3(&values);

    let mut groups: BTreeMap<(String, Tier), (f64, usize)> = BTreeMap::new();
    for ((record, _), tier) in pairs.iter().zip(&tiers) {
        let acc = groups.entry((record.crop.clone(), *tier)).or_insert((0.0, 0));
        if let Some(y) = record.yield_kg_per_acre {
            acc.0 += y;
            acc.1 += 1;
        }
    }
    let candidates: Vec<Candidate<()>> = groups
        .into_iter()
        .filter_map(|((crop, tier), (sum, count))| {
            (count > 0).then(|| Candidate {
                partition: AggregateKey::crop(&crop),
                label: tier.as_str().to_string(),
                score: sum / count as f64,
                value: (),
            })
        })
        .collect();
    let winners = select_best(candidates, tie_break)?;
    Ok(winners
        .into_iter()
        .filter_map(|w| w.partition.crop.clone().map(|crop| (crop, w.label)))
        .collect())
}

/// Best conditions to grow each crop, 2016-2022: per axis, the tier
/// (Low/Mid/High) under which the crop yielded most. The pollution axis is
/// primary; a crop missing from another axis leaves that cell absent.
pub fn best_conditions(views: &mut Views) -> Result<Vec<BestConditionsRow>, ReportError> {
    let env = views.crop_environment(FULL_RANGE);
    let tie_break = views.tie_break();
    let by_pollution = best_tier_per_crop(&env, |r| r.pollution, tie_break)?;
    let by_temperature = best_tier_per_crop(&env, |r| r.average_temp, tie_break)?;
    let by_precipitation = best_tier_per_crop(&env, |r| r.avg_precip, tie_break)?;
    Ok(by_pollution
        .into_iter()
        .map(|(crop, best_pollution)| {
            let best_temp = by_temperature.get(&crop).cloned().unwrap_or_default();
            let best_precip = by_precipitation.get(&crop).cloned().unwrap_or_default();
            BestConditionsRow {
                crop,
                best_pollution,
                best_temp,
                best_precip,
            }
        })
        .collect())
}

/// Best crop to plant per state by mean yield over all years.
pub fn best_crop_by_state(views: &mut Views) -> Result<Vec<BestCropByStateRow>, ReportError> {
    let tie_break = views.tie_break();
    let per_state_crop = aggregate(
        &views.dataset().crop,
        |c| Some(AggregateKey::state_crop(&c.state, &c.crop)),
        &[Metric {
            name: AVG_YIELD,
            get: |c| c.yield_kg_per_acre,
        }],
    );
    let winners = winners_by(per_state_crop, RankLabel::Crop, tie_break)?;
    Ok(winners
        .into_iter()
        .map(|w| BestCropByStateRow {
            state: w.partition.state.clone().unwrap_or_default(),
            best_crop_to_plant: w.label,
            avg_yield_kg_per_acre: format_number(w.score, 2),
        })
        .collect())
}

/// Tier the records along one axis, group (tier, crop), and keep the
/// winning crop per tier. Output is sorted by tier label as a plain
/// string, matching the source ordering (High < Low < Mid).
fn best_crop_per_tier(
    env: &[CropEnvRecord],
    axis: fn(&CropEnvRecord) -> Option<f64>,
    tie_break: TieBreak,
) -> Result<Vec<(String, String, f64)>, ReportError> {
    let pairs: Vec<(&CropEnvRecord, f64)> = env
        .iter()
        .filter_map(|r| axis(r).map(|v| (r, v)))
        .collect();
    let values: Vec<f64> = pairs.iter().map(|(_, v)| *v).collect();
    let tiers = ntile3(&values);

    let mut groups: BTreeMap<(Tier, String), (f64, usize)> = BTreeMap::new();
    for ((record, _), tier) in pairs.iter().zip(&tiers) {
        let acc = groups.entry((*tier, record.crop.clone())).or_insert((0.0, 0));
        if let Some(y) = record.yield_kg_per_acre {
            acc.0 += y;
            acc.1 += 1;
        }
    }
    let candidates: Vec<Candidate<Tier>> = groups
        .into_iter()
        .filter_map(|((tier, crop), (sum, count))| {
            (count > 0).then(|| Candidate {
                partition: AggregateKey::tier(tier),
                label: crop,
                score: sum / count as f64,
                value: tier,
            })
        })
        .collect();
    let winners = select_best(candidates, tie_break)?;
    let mut out: Vec<(String, String, f64)> = winners
        .into_iter()
        .map(|w| (w.value.as_str().to_string(), w.label, w.score))
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

/// Best crop per pollution tier, 2016-2021.
pub fn best_crop_by_pollution_tier(
    views: &mut Views,
) -> Result<Vec<BestCropByPollutionRow>, ReportError> {
    let env = views.crop_environment(YIELD_RANGE);
    let winners = best_crop_per_tier(&env, |r| r.pollution, views.tie_break())?;
    Ok(winners
        .into_iter()
        .map(|(group, crop, avg)| BestCropByPollutionRow {
            pollution_group: group,
            crop,
            avg_yield: format_number(avg, 2),
        })
        .collect())
}

/// Best crop per temperature tier, 2016-2021.
pub fn best_crop_by_temperature_tier(
    views: &mut Views,
) -> Result<Vec<BestCropByTemperatureRow>, ReportError> {
    let env = views.crop_environment(YIELD_RANGE);
    let winners = best_crop_per_tier(&env, |r| r.average_temp, views.tie_break())?;
    Ok(winners
        .into_iter()
        .map(|(group, crop, avg)| BestCropByTemperatureRow {
            temp_group: group,
            crop,
            avg_yield: format_number(avg, 2),
        })
        .collect())
}

/// Best crop per precipitation tier, 2016-2021.
pub fn best_crop_by_precipitation_tier(
    views: &mut Views,
) -> Result<Vec<BestCropByPrecipitationRow>, ReportError> {
    let env = views.crop_environment(YIELD_RANGE);
    let winners = best_crop_per_tier(&env, |r| r.avg_precip, views.tie_break())?;
    Ok(winners
        .into_iter()
        .map(|(group, crop, avg)| BestCropByPrecipitationRow {
            precip_group: group,
            crop,
            avg_yield: format_number(avg, 2),
        })
        .collect())
}

/// Best crop per state over records with a pollution match, 2016-2022,
/// with the winner's mean pollutant concentrations.
pub fn best_crop_state_pollution(
    views: &mut Views,
) -> Result<Vec<BestCropStatePollutionRow>, ReportError> {
    let env = views.crop_environment(FULL_RANGE);
    let per_state_crop = aggregate(
        &env,
        |r| {
            r.pollution
                .is_some()
                .then(|| AggregateKey::state_crop(&r.state, &r.crop))
        },
        &[
            Metric { name: AVG_YIELD, get: |r| r.yield_kg_per_acre },
            Metric { name: AVG_CO, get: |r| r.avg_co },
            Metric { name: AVG_NO2, get: |r| r.avg_no2 },
            Metric { name: AVG_SO2, get: |r| r.avg_so2 },
            Metric { name: AVG_O3, get: |r| r.avg_o3 },
        ],
    );
    let winners = winners_by(per_state_crop, RankLabel::Crop, views.tie_break())?;
    Ok(winners
        .into_iter()
        .map(|w| BestCropStatePollutionRow {
            state: w.partition.state.clone().unwrap_or_default(),
            best_crop_by_pollution: w.label,
            avg_yield_kg_per_acre: format_number(w.score, 2),
            avg_co: fmt_opt(w.value.metric(AVG_CO), 4),
            avg_no2: fmt_opt(w.value.metric(AVG_NO2), 4),
            avg_so2: fmt_opt(w.value.metric(AVG_SO2), 4),
            avg_o3: fmt_opt(w.value.metric(AVG_O3), 4),
        })
        .collect())
}

/// Best crop per state over records with a temperature match, 2016-2022.
pub fn best_crop_state_temperature(
    views: &mut Views,
) -> Result<Vec<BestCropStateTemperatureRow>, ReportError> {
    let env = views.crop_environment(FULL_RANGE);
    let per_state_crop = aggregate(
        &env,
        |r| {
            r.average_temp
                .is_some()
                .then(|| AggregateKey::state_crop(&r.state, &r.crop))
        },
        &[
            Metric { name: AVG_YIELD, get: |r| r.yield_kg_per_acre },
            Metric { name: AVG_TEMP, get: |r| r.average_temp },
        ],
    );
    let winners = winners_by(per_state_crop, RankLabel::Crop, views.tie_break())?;
    Ok(winners
        .into_iter()
        .map(|w| BestCropStateTemperatureRow {
            state: w.partition.state.clone().unwrap_or_default(),
            crop: w.label,
            avg_yield: format_number(w.score, 2),
            avg_temp: fmt_opt(w.value.metric(AVG_TEMP), 2),
        })
        .collect())
}

/// Best crop per state over records with a precipitation match, 2016-2022.
pub fn best_crop_state_precipitation(
    views: &mut Views,
) -> Result<Vec<BestCropStatePrecipitationRow>, ReportError> {
    let env = views.crop_environment(FULL_RANGE);
    let per_state_crop = aggregate(
        &env,
        |r| {
            r.avg_precip
                .is_some()
                .then(|| AggregateKey::state_crop(&r.state, &r.crop))
        },
        &[
            Metric { name: AVG_YIELD, get: |r| r.yield_kg_per_acre },
            Metric { name: AVG_PRECIPITATION, get: |r| r.avg_precip },
        ],
    );
    let winners = winners_by(per_state_crop, RankLabel::Crop, views.tie_break())?;
    Ok(winners
        .into_iter()
        .map(|w| BestCropStatePrecipitationRow {
            state: w.partition.state.clone().unwrap_or_default(),
            crop: w.label,
            avg_yield: format_number(w.score, 2),
            avg_precip: fmt_opt(w.value.metric(AVG_PRECIPITATION), 2),
        })
        .collect())
}

/// Best crop per season over observations carrying a season label.
pub fn best_crop_by_season(views: &mut Views) -> Result<Vec<BestCropBySeasonRow>, ReportError> {
    let tie_break = views.tie_break();
    let per_season_crop = aggregate(
        &views.dataset().crop,
        |c| {
            c.season
                .as_deref()
                .map(|s| AggregateKey::season_crop(s, &c.crop))
        },
        &[Metric {
            name: AVG_YIELD,
            get: |c| c.yield_kg_per_acre,
        }],
    );
    let winners = winners_by(per_season_crop, RankLabel::Crop, tie_break)?;
    Ok(winners
        .into_iter()
        .map(|w| BestCropBySeasonRow {
            season: w.partition.season.clone().unwrap_or_default(),
            best_crop: w.label,
            avg_yield_kg_per_acre: format_number(w.score, 2),
        })
        .collect())
}

/// Best season per crop, the transpose of the previous report.
pub fn best_season_per_crop(views: &mut Views) -> Result<Vec<BestSeasonByCropRow>, ReportError> {
    let tie_break = views.tie_break();
    let per_season_crop = aggregate(
        &views.dataset().crop,
        |c| {
            c.season
                .as_deref()
                .map(|s| AggregateKey::season_crop(s, &c.crop))
        },
        &[Metric {
            name: AVG_YIELD,
            get: |c| c.yield_kg_per_acre,
        }],
    );
    let winners = winners_by(per_season_crop, RankLabel::Season, tie_break)?;
    Ok(winners
        .into_iter()
        .map(|w| BestSeasonByCropRow {
            crop: w.partition.crop.clone().unwrap_or_default(),
            best_season_to_plant: w.label,
            avg_yield_kg_per_acre: format_number(w.score, 2),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Resilience report
// ---------------------------------------------------------------------------

/// Climate resilience ranking, 2016-2022, under the given extremity bands.
/// Returns the ranking rows plus the number of crops the sample guard
/// suppressed.
pub fn resilience_report(
    views: &mut Views,
    bands: &ExtremityBands,
) -> Result<(Vec<ResilienceRow>, usize), ReportError> {
    let env = views.crop_environment(FULL_RANGE);
    let ranking = resilience_ranking(&env, bands);
    let rows = ranking
        .rows
        .into_iter()
        .map(|r| ResilienceRow {
            crop: r.crop,
            avg_yield_in_extremes: fmt_opt(r.avg_yield_in_extremes, 2),
        })
        .collect();
    Ok((rows, ranking.excluded_by_guard))
}

// ---------------------------------------------------------------------------
// State lookup
// ---------------------------------------------------------------------------

/// Resolve one state's summary row. Unlike the tabular reports, absence
/// here is an error the caller sees.
pub fn state_lookup(views: &mut Views, name: &str) -> Result<StateSummaryRow, ReportError> {
    let key = AggregateKey::state(name);
    {
        let pollution = views.pollution_by_state(FULL_RANGE);
        lookup(&pollution, &key)?;
    }
    let target = key.state.unwrap_or_default();
    let rows = state_summary(views)?;
    rows.into_iter()
        .find(|r| r.state == target)
        .ok_or(ReportError::EmptyGroup { key: target })
}
