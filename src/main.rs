use std::env;
use std::error::Error;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use chrono::{DateTime, Local};
use regex::Regex;
use mob_traces_conversion_lib::*;
use mob_traces_conversion_lib::infection::convert_infection_schedule;
use mob_traces_conversion_lib::sector::SectorTraceDocument;

struct ScenarioInput {
    name: String,
    mobility_path: PathBuf,
    sector_path: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <batch config path>", args[0]);
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);
    let batch_config = BatchConfig::read_input_from_file(&config_path)?;

    let shutdown_triggered = Arc::new(AtomicBool::new(false));
    let s = Arc::clone(&shutdown_triggered);
    ctrlc::set_handler(move || {
        s.store(true, Ordering::SeqCst);
    })?;

    convert_reports(&batch_config, &config_path, &shutdown_triggered)
}

fn convert_reports(
    batch_config: &BatchConfig,
    config_path: &Path,
    shutdown_triggered: &AtomicBool,
) -> Result<(), Box<dyn Error>> {
    let reports_dir = batch_config.paths.get_reports_dir();
    let scenarios = discover_scenarios(&reports_dir)?;
    let infection_log_path = reports_dir.join("infection_log.json");
    if scenarios.is_empty() {
        println!("No mobility trace reports found in {}", reports_dir.display());
        if !(batch_config.parameters.convert_infection_log && infection_log_path.exists()) {
            return Ok(());
        }
    }

    let folder_prefix = config_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or("could not get the batch config file name")?;
    let generated_folder =
        create_folder_with_timestamp(batch_config.paths.get_output_dir(), folder_prefix)?;

    let toml_string = toml::to_string(batch_config)?;
    let mut config_copy = File::create(generated_folder.join("batch_config_copy.toml"))?;
    config_copy.write_all(toml_string.as_bytes())?;

    let start_time = SystemTime::now();
    let total_number_of_scenarios = scenarios.len();
    let mut converted = 0;
    'all_scenarios: for (index, scenario) in scenarios.iter().enumerate() {
        if shutdown_triggered.load(Ordering::SeqCst) {
            println!(
                "Shutdown triggered, stopping after {} of {} scenarios",
                converted, total_number_of_scenarios
            );
            break 'all_scenarios;
        }
        let now: DateTime<Local> = Local::now();
        println!(
            "{}: Converting scenario {} ({} of {})",
            now,
            scenario.name,
            index + 1,
            total_number_of_scenarios
        );
        convert_scenario(scenario, &generated_folder, &batch_config.parameters)?;
        converted += 1;
    }

    if batch_config.parameters.convert_infection_log && !shutdown_triggered.load(Ordering::SeqCst) {
        if infection_log_path.exists() {
            convert_infection_schedule(
                &infection_log_path,
                &generated_folder.join("infection_schedule.json"),
                batch_config.parameters.start_offset,
            )?;
        } else {
            println!("No infection log found in {}", reports_dir.display());
        }
    }

    println!(
        "Converted {} of {} scenarios in {:?}",
        converted,
        total_number_of_scenarios,
        SystemTime::now().duration_since(start_time)?
    );
    Ok(())
}

fn discover_scenarios(reports_dir: &Path) -> Result<Vec<ScenarioInput>, Box<dyn Error>> {
    let trace_pattern = Regex::new(r"^(.*)_MobilityTraces\.json$").unwrap();
    let mut scenarios = Vec::new();
    for entry in fs::read_dir(reports_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(file_name) = path.file_name().and_then(|name| name.to_str()) {
            if let Some(captures) = trace_pattern.captures(file_name) {
                let name = captures[1].to_string();
                let sector_candidate = reports_dir.join(format!("{}_SectorMobility.json", name));
                let sector_path = if sector_candidate.exists() {
                    Some(sector_candidate)
                } else {
                    None
                };
                scenarios.push(ScenarioInput {
                    name,
                    mobility_path: path.clone(),
                    sector_path,
                });
            }
        }
    }
    // read_dir order depends on the filesystem
    scenarios.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(scenarios)
}

fn convert_scenario(
    scenario: &ScenarioInput,
    generated_folder: &Path,
    parameters: &Parameters,
) -> Result<(), Box<dyn Error>> {
    let mut document = TraceDocument::read_from_file(&scenario.mobility_path)?;
    document.apply_time_transform(parameters.speedup_factor, parameters.start_offset)?;
    let movements_path = generated_folder.join(format!("{}.movements", scenario.name));
    document.write_bonnmotion_file(&movements_path)?;
    println!("Converted mobility data saved to {}.", movements_path.display());

    if parameters.write_trajectory_csvs {
        let trajectory_directory = generated_folder.join(format!("{}_trajectories", scenario.name));
        let files = document.write_trajectory_csvs(&trajectory_directory)?;
        println!(
            "Saved {} trajectory files to {}",
            files.len(),
            trajectory_directory.display()
        );
    }

    if parameters.convert_sector_traces {
        if let Some(sector_path) = &scenario.sector_path {
            let sector_document = SectorTraceDocument::read_from_file(sector_path)?;
            let mut sector_trace = sector_document.to_trace_document()?;
            sector_trace.apply_time_transform(parameters.speedup_factor, parameters.start_offset)?;
            let sector_movements_path =
                generated_folder.join(format!("{}_sectors.movements", scenario.name));
            sector_trace.write_bonnmotion_file(&sector_movements_path)?;
            println!(
                "Converted sector mobility data saved to {}.",
                sector_movements_path.display()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_batch_config(dir: &Path) -> PathBuf {
        let config_path = dir.join("batch_config.toml");
        std::fs::write(
            &config_path,
            "[paths]\nreports_dir = \"reports\"\noutput_dir = \"converted\"\n",
        )
        .unwrap();
        config_path
    }

    fn single_generated_folder(output_dir: &Path) -> PathBuf {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(output_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        entries.remove(0)
    }

    #[test]
    fn batch_runs_convert_every_discovered_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let reports_dir = dir.path().join("reports");
        std::fs::create_dir_all(&reports_dir).unwrap();
        std::fs::write(
            reports_dir.join("campus_MobilityTraces.json"),
            r#"{"1": {"timestamps": [0, 1], "positions": [{"x": 0.0, "y": 0.0}, {"x": 1.5, "y": 2.0}]}}"#,
        )
        .unwrap();
        let config_path = write_batch_config(dir.path());
        let batch_config = BatchConfig::read_input_from_file(&config_path).unwrap();
        let shutdown = AtomicBool::new(false);
        convert_reports(&batch_config, &config_path, &shutdown).unwrap();

        let generated = single_generated_folder(&dir.path().join("converted"));
        assert_eq!(
            std::fs::read_to_string(generated.join("campus.movements")).unwrap(),
            "0 0.0 0.0 1 1.5 2.0\n"
        );
        assert!(generated.join("batch_config_copy.toml").exists());
    }

    #[test]
    fn infection_logs_convert_without_any_mobility_reports() {
        let dir = tempfile::tempdir().unwrap();
        let reports_dir = dir.path().join("reports");
        std::fs::create_dir_all(&reports_dir).unwrap();
        std::fs::write(
            reports_dir.join("infection_log.json"),
            r#"[{"node_id": 3, "malware_active_time": 12.5}]"#,
        )
        .unwrap();
        let config_path = write_batch_config(dir.path());
        let batch_config = BatchConfig::read_input_from_file(&config_path).unwrap();
        let shutdown = AtomicBool::new(false);
        convert_reports(&batch_config, &config_path, &shutdown).unwrap();

        let generated = single_generated_folder(&dir.path().join("converted"));
        assert!(generated.join("infection_schedule.json").exists());
    }
}
