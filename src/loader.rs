use crate::error::ReportError;
use crate::types::{
    CropObservation, PollutionObservation, PrecipitationObservation, RawCropRow, RawPollutionRow,
    RawPrecipitationRow, RawTemperatureRow, TemperatureObservation,
};
use crate::util::{canonical_season, canonical_state, parse_date_safe, parse_f64_safe, parse_i32_safe};
use chrono::Datelike;
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;

/// Per-source load diagnostics, printed after every load.
///
/// `parse_errors` counts rows dropped because a key column (state, year,
/// crop) was missing or unparseable. A bad metric value does not drop the
/// row; it becomes `None` and is excluded from means downstream.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub parse_errors: usize,
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>, ReportError> {
    Ok(ReaderBuilder::new().flexible(true).from_path(path)?)
}

/// Validate that every required header is present before touching any row.
/// A missing column is an upstream contract violation and fails the whole
/// load, unlike a bad cell value.
fn require_columns(
    rdr: &mut csv::Reader<File>,
    path: &Path,
    required: &[&str],
) -> Result<(), ReportError> {
    let headers = rdr.headers()?.clone();
    for col in required {
        if !headers.iter().any(|h| h.trim() == *col) {
            return Err(ReportError::MissingColumn {
                column: col.to_string(),
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}

pub fn load_crop(path: &Path) -> Result<(Vec<CropObservation>, LoadReport), ReportError> {
    let mut rdr = open_reader(path)?;
    require_columns(&mut rdr, path, &["state", "year", "crop", "yield_kg_per_acre"])?;

    let mut total_rows = 0usize;
    let mut parse_errors = 0usize;
    let mut out: Vec<CropObservation> = Vec::new();
    for result in rdr.deserialize::<RawCropRow>() {
        total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                parse_errors += 1;
                continue;
            }
        };
        let Some(state) = canonical_state(row.state.as_deref()) else {
            parse_errors += 1;
            continue;
        };
        let Some(year) = parse_i32_safe(row.year.as_deref()) else {
            parse_errors += 1;
            continue;
        };
        let crop = match row.crop.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => {
                parse_errors += 1;
                continue;
            }
        };
        out.push(CropObservation {
            year,
            state,
            season: canonical_season(row.season.as_deref()),
            crop,
            yield_kg_per_acre: parse_f64_safe(row.yield_kg_per_acre.as_deref()),
        });
    }
    let kept_rows = out.len();
    Ok((out, LoadReport { total_rows, kept_rows, parse_errors }))
}

pub fn load_pollution(path: &Path) -> Result<(Vec<PollutionObservation>, LoadReport), ReportError> {
    let mut rdr = open_reader(path)?;
    require_columns(
        &mut rdr,
        path,
        &["State", "Year", "CO Mean", "NO2 Mean", "SO2 Mean", "O3 Mean"],
    )?;

    let mut total_rows = 0usize;
    let mut parse_errors = 0usize;
    let mut out: Vec<PollutionObservation> = Vec::new();
    for result in rdr.deserialize::<RawPollutionRow>() {
        total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                parse_errors += 1;
                continue;
            }
        };
        let Some(state) = canonical_state(row.state.as_deref()) else {
            parse_errors += 1;
            continue;
        };
        let Some(year) = parse_i32_safe(row.year.as_deref()) else {
            parse_errors += 1;
            continue;
        };
        out.push(PollutionObservation {
            year,
            state,
            season: canonical_season(row.season.as_deref()),
            co: parse_f64_safe(row.co.as_deref()),
            no2: parse_f64_safe(row.no2.as_deref()),
            so2: parse_f64_safe(row.so2.as_deref()),
            o3: parse_f64_safe(row.o3.as_deref()),
        });
    }
    let kept_rows = out.len();
    Ok((out, LoadReport { total_rows, kept_rows, parse_errors }))
}

pub fn load_temperature(
    path: &Path,
) -> Result<(Vec<TemperatureObservation>, LoadReport), ReportError> {
    let mut rdr = open_reader(path)?;
    require_columns(&mut rdr, path, &["state", "year", "average_temp"])?;

    let mut total_rows = 0usize;
    let mut parse_errors = 0usize;
    let mut out: Vec<TemperatureObservation> = Vec::new();
    for result in rdr.deserialize::<RawTemperatureRow>() {
        total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                parse_errors += 1;
                continue;
            }
        };
        let Some(state) = canonical_state(row.state.as_deref()) else {
            parse_errors += 1;
            continue;
        };
        let Some(year) = parse_i32_safe(row.year.as_deref()) else {
            parse_errors += 1;
            continue;
        };
        out.push(TemperatureObservation {
            year,
            state,
            season: canonical_season(row.season.as_deref()),
            average_temp: parse_f64_safe(row.average_temp.as_deref()),
        });
    }
    let kept_rows = out.len();
    Ok((out, LoadReport { total_rows, kept_rows, parse_errors }))
}

pub fn load_precipitation(
    path: &Path,
) -> Result<(Vec<PrecipitationObservation>, LoadReport), ReportError> {
    let mut rdr = open_reader(path)?;
    require_columns(&mut rdr, path, &["state", "start_date", "precipitation"])?;

    let mut total_rows = 0usize;
    let mut parse_errors = 0usize;
    let mut out: Vec<PrecipitationObservation> = Vec::new();
    for result in rdr.deserialize::<RawPrecipitationRow>() {
        total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                parse_errors += 1;
                continue;
            }
        };
        let Some(state) = canonical_state(row.state.as_deref()) else {
            parse_errors += 1;
            continue;
        };
        // The weather source has no year column; derive it from the event
        // start date.
        let Some(date) = parse_date_safe(row.start_date.as_deref()) else {
            parse_errors += 1;
            continue;
        };
        out.push(PrecipitationObservation {
            year: date.year(),
            state,
            season: canonical_season(row.season.as_deref()),
            precipitation: parse_f64_safe(row.precipitation.as_deref()),
        });
    }
    let kept_rows = out.len();
    Ok((out, LoadReport { total_rows, kept_rows, parse_errors }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_csv(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn crop_loader_canonicalizes_and_keeps_bad_metrics() {
        let path = temp_csv(
            "crop_loader_test.csv",
            "state,year,season,crop,yield_kg_per_acre\n\
             texas,2020,winter,corn,100.5\n\
             Texas,2020,,corn,n/a\n\
             ,2020,,corn,50\n\
             Iowa,not_a_year,,corn,50\n",
        );
        let (rows, report) = load_crop(&path).unwrap();
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.kept_rows, 2);
        assert_eq!(report.parse_errors, 2);
        assert_eq!(rows[0].state, "TEXAS");
        assert_eq!(rows[0].season.as_deref(), Some("Winter"));
        assert_eq!(rows[1].state, "TEXAS");
        // Unparseable metric degrades to None, row survives.
        assert_eq!(rows[1].yield_kg_per_acre, None);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let path = temp_csv(
            "crop_missing_col_test.csv",
            "state,year,season\nTexas,2020,winter\n",
        );
        let err = load_crop(&path).unwrap_err();
        match err {
            ReportError::MissingColumn { column, .. } => {
                assert_eq!(column, "crop");
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn precipitation_year_derived_from_start_date() {
        let path = temp_csv(
            "precip_loader_test.csv",
            "state,season,start_date,precipitation\n\
             iowa,spring,2019-04-12,3.5\n\
             iowa,spring,bad-date,3.5\n",
        );
        let (rows, report) = load_precipitation(&path).unwrap();
        assert_eq!(report.kept_rows, 1);
        assert_eq!(report.parse_errors, 1);
        assert_eq!(rows[0].year, 2019);
        assert_eq!(rows[0].state, "IOWA");
    }
}
