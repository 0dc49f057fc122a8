use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// What to do when a frame lacks a property its subject declared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum MissingPropertyPolicy {
    /// Publish `fill_value` in the missing slot.
    #[default]
    #[serde(alias = "fill", alias = "Lenient", alias = "lenient")]
    Fill,
    /// Drop the whole frame.
    #[serde(alias = "reject", alias = "Strict", alias = "strict")]
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// `ip:port` to listen on. Multicast groups are joined on all interfaces.
    pub connection: String,
    /// Datagrams waiting for the consumer. Newer datagrams are dropped once full.
    pub queue_capacity: usize,
    pub missing_properties: MissingPropertyPolicy,
    pub fill_value: f32,
}

fn default_connection() -> String {
    "0.0.0.0:54321".to_string()
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            connection: default_connection(),
            queue_capacity: default_queue_capacity(),
            missing_properties: MissingPropertyPolicy::default(),
            fill_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub enum OutputMode {
    #[default]
    #[serde(alias = "log")]
    Log,
    #[serde(alias = "Generic", alias = "GenericUDP", alias = "generic")]
    Generic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    #[serde(alias = "output_mode")]
    pub mode: OutputMode,
    pub send_address: String,
    pub send_port: u16,
}

fn default_send_address() -> String {
    "127.0.0.1".to_string()
}

fn default_send_port() -> u16 {
    9000
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            send_address: default_send_address(),
            send_port: default_send_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub output: OutputConfig,
}

impl AppConfig {
    /// Reads `path`, or writes the defaults there if it does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading config from {:?}", path);
            let file = fs::File::open(path)?;
            let reader = std::io::BufReader::new(file);
            let config = serde_json::from_reader(reader)?;
            Ok(config)
        } else {
            info!("Config not found. Creating default at {:?}", path);
            let config = Self::default();
            let file = fs::File::create(path)?;
            let writer = std::io::BufWriter::new(file);
            serde_json::to_writer_pretty(writer, &config)?;
            Ok(config)
        }
    }
}
