//! Scale-from-zero gate for the primary fleet.
//!
//! The complement of the safety gate: backups require capacity 0, and this
//! operation is how capacity leaves 0 again. Idempotent by inspection; a
//! fleet that is already active is reported as such, with no mutation.

use tracing::info;

use crate::domain::traits::FleetControl;
use crate::domain::types::ScaleUpError;

/// Result of a scale-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleUpOutcome {
    /// Desired capacity was raised from 0 to 1.
    Started,
    /// Desired capacity was already above 0; nothing was changed.
    AlreadyActive { desired_capacity: u32 },
}

/// Raise the fleet's desired capacity to 1 if it is currently 0.
pub async fn request_scale_up<F: FleetControl + ?Sized>(
    fleet_control: &F,
    fleet_name: &str,
    requesting_user: &str,
) -> Result<ScaleUpOutcome, ScaleUpError> {
    info!(
        fleet_name = fleet_name,
        user = requesting_user,
        "Scale-up requested"
    );

    let fleet = fleet_control
        .describe_fleet(fleet_name)
        .await
        .map_err(|source| ScaleUpError::Provider { source })?
        .ok_or_else(|| ScaleUpError::FleetNotFound {
            name: fleet_name.to_string(),
        })?;

    if fleet.desired_capacity > 0 {
        info!(
            fleet_name = fleet_name,
            desired_capacity = fleet.desired_capacity,
            "Fleet already active, no action taken"
        );
        return Ok(ScaleUpOutcome::AlreadyActive {
            desired_capacity: fleet.desired_capacity,
        });
    }

    fleet_control
        .set_desired_capacity(fleet_name, 1)
        .await
        .map_err(|source| ScaleUpError::Provider { source })?;

    info!(fleet_name = fleet_name, "Desired capacity set to 1");
    Ok(ScaleUpOutcome::Started)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mock::MockFleetControl;

    #[tokio::test]
    async fn scales_an_idle_fleet_to_one() {
        let fleet_control = MockFleetControl::with_fleet("Fleet-A", 0);
        let outcome = request_scale_up(&fleet_control, "Fleet-A", "ops")
            .await
            .unwrap();
        assert_eq!(outcome, ScaleUpOutcome::Started);
        assert_eq!(
            fleet_control.capacity_updates(),
            vec![("Fleet-A".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn second_call_reports_already_active_and_mutates_nothing() {
        let fleet_control = MockFleetControl::with_fleet("Fleet-A", 0);

        let first = request_scale_up(&fleet_control, "Fleet-A", "ops")
            .await
            .unwrap();
        assert_eq!(first, ScaleUpOutcome::Started);

        let second = request_scale_up(&fleet_control, "Fleet-A", "ops")
            .await
            .unwrap();
        assert_eq!(
            second,
            ScaleUpOutcome::AlreadyActive {
                desired_capacity: 1
            }
        );
        // Only the first call issued a mutation.
        assert_eq!(fleet_control.capacity_updates().len(), 1);
    }

    #[tokio::test]
    async fn unknown_fleet_is_not_found() {
        let fleet_control = MockFleetControl::new();
        let err = request_scale_up(&fleet_control, "Fleet-Z", "ops")
            .await
            .unwrap_err();
        assert!(matches!(err, ScaleUpError::FleetNotFound { .. }));
    }

    #[tokio::test]
    async fn provider_failure_is_surfaced() {
        let fleet_control = MockFleetControl::with_fleet("Fleet-A", 0);
        fleet_control.set_fail_describe(true);
        let err = request_scale_up(&fleet_control, "Fleet-A", "ops")
            .await
            .unwrap_err();
        assert!(matches!(err, ScaleUpError::Provider { .. }));
    }
}
