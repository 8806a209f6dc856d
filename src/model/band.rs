use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::FluxgateError;

/// A single rate dimension within a rule: `capacity` permits refilling over
/// `window`. Immutable once built.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Band {
    #[serde(with = "duration_nanos")]
    window: Duration,
    capacity: u64,
    #[serde(default)]
    label: Option<String>,
}

impl Band {
    pub fn new(window: Duration, capacity: u64, label: Option<String>) -> Result<Self, FluxgateError> {
        if capacity < 1 {
            return Err(FluxgateError::Config(
                "band capacity must be >= 1".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(FluxgateError::Config(
                "band window must be > 0".to_string(),
            ));
        }
        Ok(Self {
            window,
            capacity,
            label,
        })
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn window_nanos(&self) -> u64 {
        self.window.as_nanos() as u64
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bucket-key partition name for this band — `"default"` when unlabeled.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("default")
    }
}

mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_nanos() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let nanos = u64::deserialize(d)?;
        Ok(Duration::from_nanos(nanos))
    }
}
