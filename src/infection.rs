use std::error::Error;
use std::fs;
use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};

/// One entry of the infection log; the extra fields the log carries per
/// entry are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InfectionLogEntry {
    pub node_id: u64,
    pub malware_active_time: f64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct InfectionSchedule {
    #[serde(rename = "infectionData")]
    pub infection_data: Vec<InfectionEvent>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InfectionEvent {
    pub node_id: u64,
    pub malware_active_time: f64,
}

impl InfectionSchedule {
    pub fn from_log_entries(entries: &[InfectionLogEntry], start_offset: Duration) -> Self {
        let mut infection_data: Vec<InfectionEvent> = entries
            .iter()
            .map(|entry| InfectionEvent {
                node_id: entry.node_id,
                malware_active_time: entry.malware_active_time + start_offset.as_secs_f64(),
            })
            .collect();
        infection_data.sort_by(|a, b| a.malware_active_time.total_cmp(&b.malware_active_time));
        InfectionSchedule { infection_data }
    }
}

pub fn convert_infection_schedule(
    input_path: &Path,
    output_path: &Path,
    start_offset: Duration,
) -> Result<(), Box<dyn Error>> {
    let entries: Vec<InfectionLogEntry> = serde_json::from_str(&read_to_string(input_path)?)?;
    let schedule = InfectionSchedule::from_log_entries(&entries, start_offset);
    for event in &schedule.infection_data {
        if event.malware_active_time <= 0.0 {
            println!(
                "Warning: node {} activates at {} which the traffic controller rejects as scheduled in the past",
                event.node_id, event.malware_active_time
            );
        }
    }
    fs::write(output_path, serde_json::to_string_pretty(&schedule)?)?;
    println!("Converted infection schedule saved to {}.", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_sorted_by_activation_time() {
        let entries = vec![
            InfectionLogEntry {
                node_id: 1,
                malware_active_time: 10.0,
            },
            InfectionLogEntry {
                node_id: 2,
                malware_active_time: 5.5,
            },
        ];
        let schedule = InfectionSchedule::from_log_entries(&entries, Duration::ZERO);
        assert_eq!(
            schedule.infection_data[0],
            InfectionEvent {
                node_id: 2,
                malware_active_time: 5.5
            }
        );
        assert_eq!(schedule.infection_data[1].node_id, 1);
    }

    #[test]
    fn start_offset_shifts_activation_times() {
        let entries = vec![InfectionLogEntry {
            node_id: 4,
            malware_active_time: 10.0,
        }];
        let schedule = InfectionSchedule::from_log_entries(&entries, Duration::from_secs(30));
        assert_eq!(schedule.infection_data[0].malware_active_time, 40.0);
    }

    #[test]
    fn extra_log_fields_are_ignored() {
        let log = r#"[{
            "node_id": 12,
            "infected_by": 3,
            "malware_active_time": 847.2,
            "node_postion_at_active_infected": "(1508.23,1392.17)",
            "infection_status": "Infected Active"
        }]"#;
        let entries: Vec<InfectionLogEntry> = serde_json::from_str(log).unwrap();
        assert_eq!(entries[0].node_id, 12);
        assert_eq!(entries[0].malware_active_time, 847.2);
    }

    #[test]
    fn schedule_files_are_sorted_and_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("infection_log.json");
        let output_path = dir.path().join("infection_schedule.json");
        std::fs::write(
            &input_path,
            r#"[
                {"node_id": 2, "malware_active_time": 120.5, "infection_status": "Infected Active"},
                {"node_id": 7, "malware_active_time": 60.0, "infection_status": "Infected Active"}
            ]"#,
        )
        .unwrap();
        convert_infection_schedule(&input_path, &output_path, Duration::ZERO).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output_path).unwrap()).unwrap();
        let events = value["infectionData"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["node_id"], 7);
        assert_eq!(events[1]["node_id"], 2);
    }

    #[test]
    fn schedules_with_past_events_still_convert() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("infection_log.json");
        let output_path = dir.path().join("infection_schedule.json");
        std::fs::write(&input_path, r#"[{"node_id": 1, "malware_active_time": 0.0}]"#).unwrap();
        convert_infection_schedule(&input_path, &output_path, Duration::ZERO).unwrap();
        assert!(output_path.exists());
    }
}
