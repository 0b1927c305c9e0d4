//! Location provider capability

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::PermissionState;
use crate::Result;

/// A position fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl Position {
    /// Build a map link for this position
    ///
    /// `base` is the map URL up to the query value, e.g. `https://maps.google.com/?q=`
    #[must_use]
    pub fn map_link(&self, base: &str) -> String {
        format!("{base}{},{}", self.latitude, self.longitude)
    }
}

/// Options for a single position request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Prefer GPS over coarse network location
    pub high_accuracy: bool,
    /// Give up after this long
    pub timeout: Duration,
}

/// Source of position fixes
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Current location permission
    async fn check_permission(&self) -> Result<PermissionState>;

    /// Prompt for location permission
    async fn request_permission(&self) -> Result<PermissionState>;

    /// Acquire the current position
    async fn current_position(&self, options: &PositionOptions) -> Result<Position>;
}
