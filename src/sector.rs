use std::collections::HashMap;
use std::error::Error;
use std::fs::read_to_string;
use std::path::Path;
use serde::Deserialize;
use serde_json::Number;
use crate::{NodeRecord, Position, TraceDocument};

#[derive(Debug, Deserialize)]
pub struct SectorTraceDocument {
    pub movements: HashMap<String, Vec<SectorSample>>,
    pub sectors: HashMap<String, SectorEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectorSample {
    pub sector: u64,
    pub timestamp: Number,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectorEntry {
    pub coord: Position,
}

impl SectorTraceDocument {
    pub fn read_from_file(file_path: &Path) -> Result<Self, Box<dyn Error>> {
        let document: Self = serde_json::from_str(&read_to_string(file_path)?)?;
        Ok(document)
    }

    /// Replaces every sector visit by that sector's centre coordinate,
    /// nodes ordered by numeric id.
    pub fn to_trace_document(&self) -> Result<TraceDocument, Box<dyn Error>> {
        let mut movements: Vec<(u64, &Vec<SectorSample>)> = Vec::with_capacity(self.movements.len());
        for (node_id, samples) in &self.movements {
            let numeric_id = node_id
                .parse::<u64>()
                .map_err(|_| format!("movement key {:?} is not a numeric node id", node_id))?;
            movements.push((numeric_id, samples));
        }
        movements.sort_by_key(|entry| entry.0);

        let mut document = TraceDocument::new();
        for (node_id, samples) in movements {
            let mut record = NodeRecord::default();
            for sample in samples {
                let sector = self
                    .sectors
                    .get(&sample.sector.to_string())
                    .ok_or_else(|| {
                        format!("node {}: no coordinates for sector {}", node_id, sample.sector)
                    })?;
                record.push_sample(sector.coord.clone(), sample.timestamp.clone());
            }
            document.insert(node_id.to_string(), record);
        }
        Ok(document)
    }
}

pub fn convert_sector_traces(input_path: &Path, output_path: &Path) -> Result<(), Box<dyn Error>> {
    let sector_document = SectorTraceDocument::read_from_file(input_path)?;
    let document = sector_document.to_trace_document()?;
    document.write_bonnmotion_file(output_path)?;
    println!("Converted sector mobility data saved to {}.", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTOR_DOCUMENT: &str = r#"{
        "movements": {
            "10": [{"sector": 0, "timestamp": 0}, {"sector": 1, "timestamp": 2}],
            "2": [{"sector": 1, "timestamp": 1.0}]
        },
        "sectors": {
            "0": {"coord": {"x": 250.0, "y": 250.0}},
            "1": {"coord": {"x": 750.0, "y": 250.0}}
        }
    }"#;

    #[test]
    fn sector_centres_substitute_for_positions() {
        let sector_document: SectorTraceDocument = serde_json::from_str(SECTOR_DOCUMENT).unwrap();
        let document = sector_document.to_trace_document().unwrap();
        let record = document.get("10").unwrap();
        assert_eq!(record.positions[0].x.to_string(), "250.0");
        assert_eq!(record.positions[0].y.to_string(), "250.0");
        assert_eq!(record.positions[1].x.to_string(), "750.0");
        assert_eq!(record.timestamps[1].to_string(), "2");
    }

    #[test]
    fn nodes_are_ordered_by_numeric_id() {
        let sector_document: SectorTraceDocument = serde_json::from_str(SECTOR_DOCUMENT).unwrap();
        let document = sector_document.to_trace_document().unwrap();
        let order: Vec<&str> = document.iter().map(|entry| entry.0.as_str()).collect();
        assert_eq!(order, vec!["2", "10"]);
    }

    #[test]
    fn timestamps_keep_their_recorded_form() {
        let sector_document: SectorTraceDocument = serde_json::from_str(SECTOR_DOCUMENT).unwrap();
        let document = sector_document.to_trace_document().unwrap();
        assert_eq!(document.get("2").unwrap().timestamps[0].to_string(), "1.0");
    }

    #[test]
    fn empty_movement_lists_make_empty_lines() {
        let input = r#"{
            "movements": {"5": []},
            "sectors": {}
        }"#;
        let sector_document: SectorTraceDocument = serde_json::from_str(input).unwrap();
        let document = sector_document.to_trace_document().unwrap();
        let mut output = Vec::new();
        document.write_bonnmotion(&mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "\n");
    }

    #[test]
    fn unknown_sectors_are_an_error() {
        let input = r#"{
            "movements": {"1": [{"sector": 9, "timestamp": 0}]},
            "sectors": {"0": {"coord": {"x": 0.0, "y": 0.0}}}
        }"#;
        let sector_document: SectorTraceDocument = serde_json::from_str(input).unwrap();
        let error = sector_document.to_trace_document().unwrap_err();
        assert!(error.to_string().contains("sector 9"));
    }

    #[test]
    fn converted_sector_files_are_bonnmotion_lines() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("sectors.json");
        let output_path = dir.path().join("sectors.movements");
        std::fs::write(&input_path, SECTOR_DOCUMENT).unwrap();
        convert_sector_traces(&input_path, &output_path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&output_path).unwrap(),
            "1.0 750.0 250.0\n0 250.0 250.0 2 750.0 250.0\n"
        );
    }
}
