use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::engine::DEFAULT_QUEUE_SIZE;
use crate::rotation::RotationPeriod;

/// Size units for folder caps.
pub const KIBIBYTE: u64 = 1024;
pub const MEBIBYTE: u64 = 1024 * KIBIBYTE;
pub const GIBIBYTE: u64 = 1024 * MEBIBYTE;

/// Default folder for rotation-managed log files.
pub const DEFAULT_LOG_FOLDER: &str = "logs";

/// Configuration for the logging service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Capacity of the report queue
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// Emit trace-level records
    #[serde(default)]
    pub trace_mode: bool,
    /// Fields merged into every emitted record
    #[serde(default)]
    pub static_fields: HashMap<String, String>,
    /// Log file rotation configuration
    #[serde(default)]
    pub rotation: Option<RotationConfig>,
}

impl LogConfig {
    /// Create a new LogConfig with defaults
    pub fn new() -> Self {
        Self {
            queue_size: default_queue_size(),
            trace_mode: false,
            static_fields: HashMap::new(),
            rotation: None,
        }
    }

    /// Set the report queue capacity
    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.queue_size = size;
        self
    }

    /// Enable trace-level records
    pub fn with_trace_mode(mut self, mode: bool) -> Self {
        self.trace_mode = mode;
        self
    }

    /// Set the static fields merged into every record
    pub fn with_static_fields(mut self, fields: HashMap<String, String>) -> Self {
        self.static_fields = fields;
        self
    }

    /// Add one static field
    pub fn with_static_field(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.static_fields.insert(key.into(), value.into());
        self
    }

    /// Set the rotation configuration
    pub fn with_rotation(mut self, rotation: RotationConfig) -> Self {
        self.rotation = Some(rotation);
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_queue_size() -> usize {
    DEFAULT_QUEUE_SIZE
}

/// Configuration for log file rotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Folder holding the rotation-managed files
    pub folder: PathBuf,
    /// Total folder size cap in bytes; `None` disables the size check
    #[serde(default)]
    pub max_folder_size: Option<u64>,
    /// Rotation cadence
    #[serde(default = "default_period")]
    pub period: RotationPeriod,
}

impl RotationConfig {
    /// Create a RotationConfig with daily rotation and no size cap
    pub fn new<P: Into<PathBuf>>(folder: P) -> Self {
        Self {
            folder: folder.into(),
            max_folder_size: None,
            period: default_period(),
        }
    }

    /// Set the folder size cap in bytes
    pub fn with_max_folder_size(mut self, size: u64) -> Self {
        self.max_folder_size = Some(size);
        self
    }

    /// Set the rotation cadence
    pub fn with_period(mut self, period: RotationPeriod) -> Self {
        self.period = period;
        self
    }
}

fn default_period() -> RotationPeriod {
    RotationPeriod::Daily
}
