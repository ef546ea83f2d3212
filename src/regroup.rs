use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use regex::Regex;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Number;
use crate::{NodeRecord, Position, TraceDocument};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLogEntry {
    Grouped {
        positions: Vec<Position>,
        timestamps: Vec<Number>,
    },
    Single {
        position: Position,
        timestamp: Number,
    },
}

/// A raw logger document regrouped into one record per node, in numeric
/// node id order. Single samples append; a grouped value replaces.
#[derive(Debug)]
pub struct RawTraceLog(pub TraceDocument);

impl<'de> Deserialize<'de> for RawTraceLog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
    {
        struct RawLogVisitor;

        impl<'de> Visitor<'de> for RawLogVisitor {
            type Value = RawTraceLog;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of node log entries")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
                where
                    A: MapAccess<'de>,
            {
                let key_pattern = Regex::new(r"^(?:nodeId:\s*)?(\d+)$").unwrap();
                let mut grouped: BTreeMap<u64, NodeRecord> = BTreeMap::new();
                while let Some(key) = map.next_key::<String>()? {
                    let node_id = key_pattern
                        .captures(key.trim())
                        .and_then(|captures| captures[1].parse::<u64>().ok())
                        .ok_or_else(|| {
                            de::Error::custom(format!("key {:?} does not name a node id", key))
                        })?;
                    let entry = map.next_value::<RawLogEntry>().map_err(|err| {
                        de::Error::custom(format!("node {}: {}", node_id, err))
                    })?;
                    match entry {
                        RawLogEntry::Single { position, timestamp } => {
                            grouped
                                .entry(node_id)
                                .or_default()
                                .push_sample(position, timestamp);
                        }
                        RawLogEntry::Grouped { positions, timestamps } => {
                            grouped.insert(node_id, NodeRecord { positions, timestamps });
                        }
                    }
                }
                let mut document = TraceDocument::new();
                for (node_id, record) in grouped {
                    document.insert(node_id.to_string(), record);
                }
                Ok(RawTraceLog(document))
            }
        }

        deserializer.deserialize_map(RawLogVisitor)
    }
}

pub fn regroup_mob_traces(input_path: &Path, output_path: &Path) -> Result<(), Box<dyn Error>> {
    let RawTraceLog(document) = serde_json::from_str(&fs::read_to_string(input_path)?)?;
    fs::write(output_path, serde_json::to_string_pretty(&document)?)?;
    println!("Regrouped mobility data saved to {}.", output_path.display());
    Ok(())
}
