// Entry point and high-level CLI flow.
//
// - Option [1] loads and cleans the four CSV sources, printing diagnostics.
// - Option [2] generates the summary reports and a JSON summary.
// - Option [3] generates the best-crop reports.
// - Option [4] generates the climate resilience ranking.
// - Option [5] looks up a single state's summary row.
// - After generating reports, the user can choose to go back to the
//   selection menu or exit.
mod aggregate;
mod config;
mod error;
mod join;
mod loader;
mod output;
mod rank;
mod reports;
mod resilience;
mod tier;
mod types;
mod util;
mod views;

use config::AppConfig;
use error::ReportError;
use loader::LoadReport;
use once_cell::sync::Lazy;
use resilience::ExtremityBands;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tabled::Tabled;
use types::Dataset;
use views::Views;

// Simple in-memory app state so we only load the CSV files once but can
// generate reports multiple times in a single run. Replacing `views` on a
// reload drops every cached intermediate derived from the old dataset.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    let config = AppConfig::load("config.json").unwrap_or_else(|e| {
        eprintln!("Failed to read config.json: {} (using defaults)", e);
        AppConfig::default()
    });
    Mutex::new(AppState {
        config,
        views: None,
    })
});

struct AppState {
    config: AppConfig,
    views: Option<Views>,
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
///
/// The prompt is reused for both the main menu and simple numeric inputs.
fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Ask the user whether to go back to the report selection menu after
/// generating reports.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        io::stdin().read_line(&mut buf).ok();
        let resp = buf.trim().to_uppercase();
        match resp.as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Write a report to CSV and print a short console preview.
fn emit_report<T>(report_no: usize, title: &str, note: Option<&str>, file: &str, rows: &[T])
where
    T: Serialize + Tabled + Clone,
{
    if let Err(e) = output::write_csv(file, rows) {
        eprintln!("Write error: {}", e);
    }
    output::preview_table(report_no, title, note, rows, 3);
    println!("(Full table exported to {})\n", file);
}

/// Handle option [1]: load and clean the four CSV sources.
///
/// On success we store a fresh `Views` over the new `Dataset` in
/// `APP_STATE` and print one diagnostic line per source.
fn handle_load() {
    let config = APP_STATE.lock().unwrap().config.clone();
    type Loaded = (Dataset, Vec<(&'static str, LoadReport)>);
    let loaded = (|| -> Result<Loaded, ReportError> {
        let (crop, crop_report) = loader::load_crop(&config.crop_path())?;
        let (pollution, pollution_report) = loader::load_pollution(&config.pollution_path())?;
        let (temperature, temperature_report) =
            loader::load_temperature(&config.temperature_path())?;
        let (precipitation, weather_report) = loader::load_precipitation(&config.weather_path())?;
        Ok((
            Dataset {
                crop,
                pollution,
                temperature,
                precipitation,
            },
            vec![
                ("crop", crop_report),
                ("pollution", pollution_report),
                ("temperature", temperature_report),
                ("precipitation", weather_report),
            ],
        ))
    })();

    match loaded {
        Ok((dataset, load_reports)) => {
            println!("Processing datasets...");
            for (name, r) in &load_reports {
                println!(
                    "  {}: {} rows read, {} kept, {} skipped due to parse/validation errors",
                    name,
                    util::format_int(r.total_rows as i64),
                    util::format_int(r.kept_rows as i64),
                    util::format_int(r.parse_errors as i64)
                );
            }
            println!("");
            let mut state = APP_STATE.lock().unwrap();
            state.views = Some(Views::new(Arc::new(dataset), config.tie_break));
        }
        Err(e) => {
            eprintln!("Failed to load data: {}\n", e);
        }
    }
}

/// Handle option [2]: the four summary reports plus `summary.json`.
fn handle_summary_reports() {
    let mut state = APP_STATE.lock().unwrap();
    let Some(views) = state.views.as_mut() else {
        println!("Error: No data loaded. Please load the data files first (option 1).\n");
        return;
    };

    println!("Generating summary reports...");
    println!("Outputs saved to individual files...\n");

    let r1 = match reports::state_summary(views) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Report error: {}\n", e);
            return;
        }
    };
    emit_report(
        1,
        "Historical Averages by State",
        None,
        "report1_state_summary.csv",
        &r1,
    );

    match reports::state_season_summary(views) {
        Ok(rows) => emit_report(
            2,
            "Historical Averages by State and Season",
            None,
            "report2_state_season_summary.csv",
            &rows,
        ),
        Err(e) => eprintln!("Report error: {}\n", e),
    }

    match reports::year_state_summary(views) {
        Ok(rows) => emit_report(
            3,
            "Historical Averages by Year and State",
            Some("Filtered: 2016-2022"),
            "report3_year_state_summary.csv",
            &rows,
        ),
        Err(e) => eprintln!("Report error: {}\n", e),
    }

    match reports::yield_environment(views) {
        Ok(rows) => emit_report(
            4,
            "Average Crop Yield vs Environment",
            Some("Filtered: 2016-2021"),
            "report4_yield_environment.csv",
            &rows,
        ),
        Err(e) => eprintln!("Report error: {}\n", e),
    }

    let summary = reports::generate_summary(views.dataset(), &r1);
    if let Err(e) = output::write_json("summary.json", &summary) {
        eprintln!("Write error: {}", e);
    }
    println!("Summary Stats (summary.json):");
    println!(
        "{{\"mean_yield\": {}, \"median_yield\": {}}}\n",
        util::format_number(summary.mean_yield, 2),
        util::format_number(summary.median_yield, 2)
    );
}

/// Handle option [3]: the rank-1 "best X" reports.
fn handle_best_crop_reports() {
    let mut state = APP_STATE.lock().unwrap();
    let Some(views) = state.views.as_mut() else {
        println!("Error: No data loaded. Please load the data files first (option 1).\n");
        return;
    };

    println!("Generating best-crop reports...");
    println!("Outputs saved to individual files...\n");

    match reports::best_conditions(views) {
        Ok(rows) => emit_report(
            5,
            "Best Conditions to Grow Each Crop",
            Some("Filtered: 2016-2022"),
            "report5_best_conditions.csv",
            &rows,
        ),
        Err(e) => eprintln!("Report error: {}\n", e),
    }

    match reports::best_crop_by_state(views) {
        Ok(rows) => emit_report(
            6,
            "Best Crop to Plant by State",
            None,
            "report6_best_crop_by_state.csv",
            &rows,
        ),
        Err(e) => eprintln!("Report error: {}\n", e),
    }

    match reports::best_crop_by_pollution_tier(views) {
        Ok(rows) => emit_report(
            7,
            "Best Crop by Pollution Level",
            Some("Filtered: 2016-2021"),
            "report7_best_crop_by_pollution.csv",
            &rows,
        ),
        Err(e) => eprintln!("Report error: {}\n", e),
    }

    match reports::best_crop_by_temperature_tier(views) {
        Ok(rows) => emit_report(
            8,
            "Best Crop by Temperature Level",
            Some("Filtered: 2016-2021"),
            "report8_best_crop_by_temperature.csv",
            &rows,
        ),
        Err(e) => eprintln!("Report error: {}\n", e),
    }

    match reports::best_crop_by_precipitation_tier(views) {
        Ok(rows) => emit_report(
            9,
            "Best Crop by Precipitation Level",
            Some("Filtered: 2016-2021"),
            "report9_best_crop_by_precipitation.csv",
            &rows,
        ),
        Err(e) => eprintln!("Report error: {}\n", e),
    }

    match reports::best_crop_state_pollution(views) {
        Ok(rows) => emit_report(
            10,
            "Best Crop by State with Pollution Averages",
            Some("Filtered: 2016-2022"),
            "report10_best_crop_state_pollution.csv",
            &rows,
        ),
        Err(e) => eprintln!("Report error: {}\n", e),
    }

    match reports::best_crop_state_temperature(views) {
        Ok(rows) => emit_report(
            11,
            "Best Crop by State with Temperature Averages",
            Some("Filtered: 2016-2022"),
            "report11_best_crop_state_temperature.csv",
            &rows,
        ),
        Err(e) => eprintln!("Report error: {}\n", e),
    }

    match reports::best_crop_state_precipitation(views) {
        Ok(rows) => emit_report(
            12,
            "Best Crop by State with Precipitation Averages",
            Some("Filtered: 2016-2022"),
            "report12_best_crop_state_precipitation.csv",
            &rows,
        ),
        Err(e) => eprintln!("Report error: {}\n", e),
    }

    match reports::best_crop_by_season(views) {
        Ok(rows) => emit_report(
            13,
            "Best Crop by Season",
            None,
            "report13_best_crop_by_season.csv",
            &rows,
        ),
        Err(e) => eprintln!("Report error: {}\n", e),
    }

    match reports::best_season_per_crop(views) {
        Ok(rows) => emit_report(
            14,
            "Best Season for Each Crop",
            None,
            "report14_best_season_per_crop.csv",
            &rows,
        ),
        Err(e) => eprintln!("Report error: {}\n", e),
    }
}

/// Handle option [4]: the climate resilience ranking.
///
/// The extremity thresholds come from the config file when set there;
/// otherwise the user must pick one of the named presets. The two presets
/// disagree materially in the source data, so neither is applied silently.
fn handle_resilience() {
    // Refuse before the threshold prompt, not after it.
    if APP_STATE.lock().unwrap().views.is_none() {
        println!("Error: No data loaded. Please load the data files first (option 1).\n");
        return;
    }
    let configured = APP_STATE.lock().unwrap().config.resilience_bands;
    let bands = match configured {
        Some(bands) => bands,
        None => {
            println!("Select extremity thresholds:");
            println!("[1] Baseline preset (pollution 15-35, temperature 15-25, precipitation 400-900)");
            println!("[2] Alternate preset (pollution up to 16, temperature 20-80, precipitation 0.01-0.16)");
            loop {
                match read_choice().as_str() {
                    "1" => break ExtremityBands::baseline(),
                    "2" => break ExtremityBands::alternate(),
                    _ => println!("Invalid choice. Please enter 1 or 2."),
                }
            }
        }
    };

    let mut state = APP_STATE.lock().unwrap();
    let Some(views) = state.views.as_mut() else {
        println!("Error: No data loaded. Please load the data files first (option 1).\n");
        return;
    };

    println!("");
    match reports::resilience_report(views, &bands) {
        Ok((rows, excluded)) => {
            emit_report(
                15,
                "Most Climate Resilient Crops",
                Some("Filtered: 2016-2022"),
                "report15_climate_resilience.csv",
                &rows,
            );
            if excluded > 0 {
                println!(
                    "Note: {} crop(s) excluded by the minimum-sample guard.\n",
                    util::format_int(excluded as i64)
                );
            }
        }
        Err(e) => eprintln!("Report error: {}\n", e),
    }
}

/// Handle option [5]: print one state's summary row.
fn handle_state_lookup() {
    print!("Enter state name: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    let name = buf.trim();
    if name.is_empty() {
        println!("No state entered.\n");
        return;
    }

    let mut state = APP_STATE.lock().unwrap();
    let Some(views) = state.views.as_mut() else {
        println!("Error: No data loaded. Please load the data files first (option 1).\n");
        return;
    };
    match reports::state_lookup(views, name) {
        Ok(row) => output::preview_table_rows(&[row], 1),
        Err(e) => eprintln!("Lookup failed: {}\n", e),
    }
}

fn main() {
    loop {
        println!("Crop and Climate Report Generator");
        println!("[1] Load the data files");
        println!("[2] Generate summary reports");
        println!("[3] Generate best-crop reports");
        println!("[4] Generate climate resilience ranking");
        println!("[5] Look up a state\n");
        match read_choice().as_str() {
            "1" => {
                handle_load();
            }
            "2" => {
                println!("");
                handle_summary_reports();
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "3" => {
                println!("");
                handle_best_crop_reports();
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "4" => {
                handle_resilience();
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "5" => {
                handle_state_lookup();
            }
            _ => {
                println!("Invalid choice. Please enter 1-5.\n");
            }
        }
    }
}
