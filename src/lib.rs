use std::error::Error;
use std::fmt;
use std::fs;
use std::fs::{File, read_to_string};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use chrono::Local;
use rand::Rng;
use relative_path::RelativePathBuf;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;
use serde_with::serde_as;
use serde_with::DurationNanoSeconds;
use serde_with::DurationSeconds;

pub mod infection;
pub mod regroup;
pub mod sector;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Position {
    pub x: Number,
    pub y: Number,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct NodeRecord {
    pub positions: Vec<Position>,
    pub timestamps: Vec<Number>,
}

impl NodeRecord {
    pub fn push_sample(&mut self, position: Position, timestamp: Number) {
        self.positions.push(position);
        self.timestamps.push(timestamp);
    }
}

/// A grouped trace document, one record per node, in input key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceDocument {
    nodes: Vec<(String, NodeRecord)>,
}

impl TraceDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_from_file(file_path: &Path) -> Result<Self, Box<dyn Error>> {
        let document: Self = serde_json::from_str(&read_to_string(file_path)?)?;
        Ok(document)
    }

    pub fn insert(&mut self, node_id: String, record: NodeRecord) {
        if let Some(existing) = self.nodes.iter_mut().find(|entry| entry.0 == node_id) {
            existing.1 = record;
        } else {
            self.nodes.push((node_id, record));
        }
    }

    pub fn get(&self, node_id: &str) -> Option<&NodeRecord> {
        self.nodes
            .iter()
            .find(|entry| entry.0 == node_id)
            .map(|entry| &entry.1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, NodeRecord)> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn write_bonnmotion<W: Write>(&self, writer: &mut W) -> Result<(), Box<dyn Error>> {
        for (node_id, record) in &self.nodes {
            if record.timestamps.len() != record.positions.len() {
                return Err(format!(
                    "node {}: {} timestamps but {} positions",
                    node_id,
                    record.timestamps.len(),
                    record.positions.len()
                )
                .into());
            }
            let mut tokens = Vec::with_capacity(record.timestamps.len() * 3);
            for (timestamp, position) in record.timestamps.iter().zip(&record.positions) {
                tokens.push(timestamp.to_string());
                tokens.push(position.x.to_string());
                tokens.push(position.y.to_string());
            }
            writeln!(writer, "{}", tokens.join(" "))?;
        }
        Ok(())
    }

    pub fn write_bonnmotion_file(&self, file_path: &Path) -> Result<(), Box<dyn Error>> {
        let mut writer = BufWriter::new(File::create(file_path)?);
        self.write_bonnmotion(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn apply_time_transform(
        &mut self,
        speedup_factor: f64,
        start_offset: Duration,
    ) -> Result<(), Box<dyn Error>> {
        if speedup_factor == 1.0 && start_offset.is_zero() {
            return Ok(());
        }
        for (node_id, record) in &mut self.nodes {
            for timestamp in &mut record.timestamps {
                let seconds = timestamp.as_f64().ok_or_else(|| {
                    format!("node {}: timestamp {} is out of range", node_id, timestamp)
                })?;
                let mut scaled = seconds * speedup_factor;
                // samples at time zero keep their initial placement
                if scaled != 0.0 {
                    scaled += start_offset.as_secs_f64();
                }
                if scaled == seconds {
                    continue;
                }
                match Number::from_f64(scaled) {
                    Some(number) if scaled >= 0.0 => *timestamp = number,
                    _ => {
                        return Err(format!(
                            "node {}: timestamp {} transforms to unusable value {}",
                            node_id, seconds, scaled
                        )
                        .into())
                    }
                }
            }
        }
        Ok(())
    }

    pub fn write_trajectory_csvs(
        &self,
        output_directory: &Path,
    ) -> Result<Vec<PathBuf>, Box<dyn Error>> {
        fs::create_dir_all(output_directory)?;
        let mut written_files = Vec::with_capacity(self.nodes.len());
        for (node_id, record) in &self.nodes {
            if node_id.chars().any(std::path::is_separator) {
                return Err(format!("node id {:?} cannot be used in a file name", node_id).into());
            }
            if record.timestamps.len() != record.positions.len() {
                return Err(format!(
                    "node {}: {} timestamps but {} positions",
                    node_id,
                    record.timestamps.len(),
                    record.positions.len()
                )
                .into());
            }
            let csv_path = output_directory.join(format!("node_{}.csv", node_id));
            let mut csv_writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&csv_path)?;
            for (timestamp, position) in record.timestamps.iter().zip(&record.positions) {
                let offset = timestamp
                    .as_f64()
                    .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
                    .ok_or_else(|| {
                        format!(
                            "node {}: timestamp {} cannot be used as a waypoint offset",
                            node_id, timestamp
                        )
                    })?;
                csv_writer.serialize(TrajectoryWaypoint {
                    x: position.x.as_f64().ok_or_else(|| {
                        format!("node {}: x coordinate {} is out of range", node_id, position.x)
                    })?,
                    y: position.y.as_f64().ok_or_else(|| {
                        format!("node {}: y coordinate {} is out of range", node_id, position.y)
                    })?,
                    offset,
                })?;
            }
            csv_writer.flush()?;
            written_files.push(csv_path);
        }
        Ok(written_files)
    }
}

impl<'de> Deserialize<'de> for TraceDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
    {
        struct TraceDocumentVisitor;

        impl<'de> Visitor<'de> for TraceDocumentVisitor {
            type Value = TraceDocument;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of node ids to trace records")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
                where
                    A: MapAccess<'de>,
            {
                let mut document = TraceDocument::new();
                while let Some((node_id, record)) = map.next_entry::<String, NodeRecord>()? {
                    document.insert(node_id, record);
                }
                Ok(document)
            }
        }

        deserializer.deserialize_map(TraceDocumentVisitor)
    }
}

impl Serialize for TraceDocument {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.nodes.len()))?;
        for (node_id, record) in &self.nodes {
            map.serialize_entry(node_id, record)?;
        }
        map.end()
    }
}

pub fn convert_mob_traces(input_path: &Path, output_path: &Path) -> Result<(), Box<dyn Error>> {
    let document = TraceDocument::read_from_file(input_path)?;
    document.write_bonnmotion_file(output_path)?;
    println!("Converted mobility data saved to {}.", output_path.display());
    Ok(())
}

#[serde_as]
#[derive(Debug, Deserialize, Serialize)]
struct TrajectoryWaypoint {
    #[serde(rename = "column1")]
    x: f64,
    #[serde(rename = "column2")]
    y: f64,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    #[serde(rename = "column3")]
    offset: Duration,
}

const RANDOM_WALK_MAX_STEP: f64 = 50.0;

pub fn generate_random_trace<R: Rng>(
    rng: &mut R,
    num_nodes: u64,
    duration: Duration,
    interval: Duration,
    world_width: f64,
    world_height: f64,
) -> Result<TraceDocument, Box<dyn Error>> {
    if !(world_width.is_finite() && world_width > 0.0)
        || !(world_height.is_finite() && world_height > 0.0)
    {
        return Err("world dimensions must be positive".into());
    }
    if interval.is_zero() {
        return Err("sample interval must not be zero".into());
    }
    let mut document = TraceDocument::new();
    for node_id in 0..num_nodes {
        let mut record = NodeRecord::default();
        let mut x = rng.gen_range(0.0..world_width);
        let mut y = rng.gen_range(0.0..world_height);
        let mut timestamp = Duration::new(0, 0);
        while timestamp < duration {
            record.push_sample(
                Position {
                    x: rounded_coordinate(x)?,
                    y: rounded_coordinate(y)?,
                },
                Number::from(timestamp.as_secs()),
            );
            x = (x + rng.gen_range(-RANDOM_WALK_MAX_STEP..RANDOM_WALK_MAX_STEP))
                .clamp(0.0, world_width);
            y = (y + rng.gen_range(-RANDOM_WALK_MAX_STEP..RANDOM_WALK_MAX_STEP))
                .clamp(0.0, world_height);
            timestamp += interval;
        }
        document.insert(node_id.to_string(), record);
    }
    Ok(document)
}

fn rounded_coordinate(value: f64) -> Result<Number, Box<dyn Error>> {
    Number::from_f64((value * 10.0).round() / 10.0)
        .ok_or_else(|| format!("coordinate {} is not finite", value).into())
}

use crate::config::Paths;

pub fn deserialize_relative_path<'de, D>(deserializer: D) -> Result<RelativePathBuf, D::Error>
    where
        D: Deserializer<'de>,
{
    let p = PathBuf::deserialize(deserializer)?;
    RelativePathBuf::from_path(&p).map_err(|_| {
        serde::de::Error::custom(format!(
            "only relative paths are allowed in the config file: {}",
            p.display()
        ))
    })
}

pub mod config {
    use std::path::PathBuf;
    use relative_path::RelativePathBuf;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Deserialize, Serialize, Clone)]
    pub struct Paths {
        #[serde(skip)]
        base_path: Option<PathBuf>,
        #[serde(deserialize_with = "super::deserialize_relative_path")]
        reports_dir: RelativePathBuf,
        #[serde(deserialize_with = "super::deserialize_relative_path")]
        output_dir: RelativePathBuf,
    }

    impl Paths {
        pub fn get_reports_dir(&self) -> PathBuf {
            self.reports_dir
                .to_path(self.base_path.as_ref().expect("base path not set"))
        }

        pub fn get_output_dir(&self) -> PathBuf {
            self.output_dir
                .to_path(self.base_path.as_ref().expect("base path not set"))
        }

        pub fn set_base_path(&mut self, base_path: PathBuf) {
            self.base_path = Some(base_path);
        }
    }
}

fn default_speedup_factor() -> f64 {
    1.0
}

fn default_convert_flag() -> bool {
    true
}

#[serde_as]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Parameters {
    #[serde(default = "default_speedup_factor")]
    pub speedup_factor: f64,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default)]
    pub start_offset: Duration,
    #[serde(default)]
    pub write_trajectory_csvs: bool,
    #[serde(default = "default_convert_flag")]
    pub convert_sector_traces: bool,
    #[serde(default = "default_convert_flag")]
    pub convert_infection_log: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            speedup_factor: default_speedup_factor(),
            start_offset: Duration::ZERO,
            write_trajectory_csvs: false,
            convert_sector_traces: default_convert_flag(),
            convert_infection_log: default_convert_flag(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BatchConfig {
    pub paths: Paths,
    #[serde(default)]
    pub parameters: Parameters,
}

impl BatchConfig {
    pub fn read_input_from_file(file_path: &Path) -> Result<Self, Box<dyn Error>> {
        let mut config: Self = toml::from_str(&read_to_string(file_path)?)?;
        let base_path = file_path
            .parent()
            .ok_or("could not determine the directory of the config file")?;
        config.paths.set_base_path(base_path.to_path_buf());
        Ok(config)
    }
}

pub fn create_folder_with_timestamp(mut path: PathBuf, prefix: &str) -> Result<PathBuf, Box<dyn Error>> {
    let current_time: chrono::DateTime<Local> = Local::now();

    // Format the date and time as a string (e.g., "2024-01-24_12-34-56")
    let formatted_timestamp = current_time.format("%Y-%m-%d_%H-%M-%S").to_string();

    let folder_name = format!("{}{}", prefix, formatted_timestamp);
    path.push(folder_name);
    fs::create_dir_all(&path)?;

    println!("Folder created: {}", path.display());
    Ok(path)
}
