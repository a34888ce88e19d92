//! One-shot discovery of the heat pump this adapter reports on.

use crate::api::{DeviceRecord, StatusClass, TelemetryApi};
use crate::session::TokenSession;
use tracing::{error, info, warn};

/// Nominal power when the model code is absent or not in the table.
pub const DEFAULT_NOMINAL_POWER_W: u32 = 6000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoilerTopology {
    Unknown,
    NoBoiler,
    OnOffBoiler,
    OpenThermBoiler,
}

impl BoilerTopology {
    /// Unrecognised codes map to `Unknown`.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => BoilerTopology::NoBoiler,
            2 => BoilerTopology::OnOffBoiler,
            3 => BoilerTopology::OpenThermBoiler,
            _ => BoilerTopology::Unknown,
        }
    }

    /// Hybrid installations have a gas boiler next to the heat pump.
    pub fn is_hybrid(self) -> bool {
        matches!(
            self,
            BoilerTopology::OnOffBoiler | BoilerTopology::OpenThermBoiler
        )
    }
}

/// Nominal power per model code.
pub fn nominal_power_for_model(model: Option<i64>) -> u32 {
    match model {
        // Blackbird P80
        Some(0) => 8000,
        // Flint P40
        Some(5) => 4000,
        _ => DEFAULT_NOMINAL_POWER_W,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub uuid: String,
    pub topology: BoilerTopology,
    pub nominal_power_w: u32,
}

impl From<&DeviceRecord> for DeviceIdentity {
    fn from(rec: &DeviceRecord) -> Self {
        Self {
            uuid: rec.id.clone(),
            topology: rec
                .boiler_type
                .map(BoilerTopology::from_code)
                .unwrap_or(BoilerTopology::Unknown),
            nominal_power_w: nominal_power_for_model(rec.model),
        }
    }
}

pub struct DeviceSetupResolver;

impl DeviceSetupResolver {
    /// List the principal's devices and pick the one to report on.
    ///
    /// `None` on any failure or an empty list; callers must not create slots or
    /// poll without an identity.
    pub async fn resolve(session: &TokenSession, api: &dyn TelemetryApi) -> Option<DeviceIdentity> {
        let Some(token) = session.access_token() else {
            error!("device setup skipped: session is not logged in");
            return None;
        };

        let res = match api.list_devices(token).await {
            Ok(res) => res,
            Err(e) => {
                error!(error = %e, "failed to list heat pumps");
                return None;
            }
        };
        if res.class() != StatusClass::Success {
            error!(status = res.status, "heat pump listing rejected");
            return None;
        }

        let devices = res.payload.unwrap_or_default();
        let first = match devices.as_slice() {
            [] => {
                error!("no heat pumps found for this account");
                return None;
            }
            [only] => only,
            [first, ..] => {
                warn!(
                    count = devices.len(),
                    uuid = %first.id,
                    "more than one heat pump found; using the first"
                );
                first
            }
        };

        let identity = DeviceIdentity::from(first);
        info!(
            uuid = %identity.uuid,
            topology = ?identity.topology,
            nominal_power_w = identity.nominal_power_w,
            "heat pump resolved"
        );
        Some(identity)
    }
}
