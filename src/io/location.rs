//! Device-location provider contract
//!
//! Geolocation is read once per analysis, in parallel with the
//! recognition call. Permission denied and missing hardware both surface
//! as `DeviceFix::Unavailable` — the pipeline falls back to the server
//! distance estimate in that case.

use crate::domain::types::{Coordinates, DeviceFix};
use crate::infra::config::{Config, LocationMode};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_fix(&self) -> DeviceFix;
}

/// Always reports the same position. Used when the operator pins the
/// device location via config or CLI flags.
pub struct FixedLocationProvider {
    position: Coordinates,
}

impl FixedLocationProvider {
    pub fn new(position: Coordinates) -> Self {
        Self { position }
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn current_fix(&self) -> DeviceFix {
        DeviceFix::Fix(self.position)
    }
}

/// Always reports no fix (no sensor, or permission denied)
pub struct UnavailableLocationProvider;

#[async_trait]
impl LocationProvider for UnavailableLocationProvider {
    async fn current_fix(&self) -> DeviceFix {
        DeviceFix::Unavailable
    }
}

/// Build the provider selected by config. `fixed` mode without both
/// coordinates degrades to unavailable rather than failing startup.
pub fn provider_from_config(config: &Config) -> Arc<dyn LocationProvider> {
    match config.location_mode() {
        LocationMode::Fixed => {
            match (config.location_latitude(), config.location_longitude()) {
                (Some(lat), Some(lon)) => {
                    let position = Coordinates::new(lat, lon);
                    info!(position = %position, "location_provider_fixed");
                    Arc::new(FixedLocationProvider::new(position))
                }
                _ => {
                    info!("location_provider_fixed_missing_coords_degrading_to_unavailable");
                    Arc::new(UnavailableLocationProvider)
                }
            }
        }
        LocationMode::Unavailable => {
            info!("location_provider_unavailable");
            Arc::new(UnavailableLocationProvider)
        }
    }
}
