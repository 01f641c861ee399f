//! Safety gate: a backup may only run while the primary fleet is scaled to
//! zero, otherwise the server and the worker would write to the same volume.

use tracing::info;

use crate::domain::traits::FleetControl;
use crate::domain::types::LaunchError;

/// Permit a backup only if the fleet's desired capacity is exactly 0.
///
/// Read-only; lookup failures surface unretried.
pub async fn ensure_fleet_idle<F: FleetControl + ?Sized>(
    fleet_control: &F,
    fleet_name: &str,
) -> Result<(), LaunchError> {
    let fleet = fleet_control
        .describe_fleet(fleet_name)
        .await
        .map_err(|source| LaunchError::FleetLookup { source })?
        .ok_or_else(|| LaunchError::FleetNotFound {
            name: fleet_name.to_string(),
        })?;

    if fleet.desired_capacity > 0 {
        return Err(LaunchError::FleetActive {
            name: fleet.name,
            desired_capacity: fleet.desired_capacity,
        });
    }

    info!(fleet_name = fleet_name, "Fleet is idle, backup may proceed");
    Ok(())
}
