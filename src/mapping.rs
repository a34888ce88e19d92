use crate::error::MappingError;
use crate::sample::RemoteSample;
use crate::sensors::{SensorHost, SlotDefinition, SlotId, SlotKind, SlotSource, SlotValue};
use tracing::{debug, error, warn};

pub const FIELD_RPM: &str = "rpm";
pub const FIELD_POWER_IN: &str = "cm_mass_power_in";
pub const FIELD_POWER_OUT: &str = "cm_mass_power_out";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedMetric {
    CompressorUsagePercent,
    CopPercent,
    PowerFromAir,
}

impl ComputedMetric {
    pub fn evaluate(self, sample: &RemoteSample, nominal_power_w: u32) -> Result<f64, MappingError> {
        match self {
            ComputedMetric::CompressorUsagePercent => Ok(compressor_usage_percent(
                sample.number(FIELD_RPM)?,
                nominal_power_w,
            )),
            ComputedMetric::CopPercent => Ok(cop_percent(
                sample.number(FIELD_POWER_OUT)?,
                sample.number(FIELD_POWER_IN)?,
            )),
            ComputedMetric::PowerFromAir => Ok(power_from_air(
                sample.number(FIELD_POWER_OUT)?,
                sample.number(FIELD_POWER_IN)?,
            )),
        }
    }
}

pub fn compressor_usage_percent(rpm: f64, nominal_power_w: u32) -> f64 {
    if nominal_power_w == 0 {
        return 0.0;
    }
    rpm / f64::from(nominal_power_w) * 100.0
}

/// Zero while the compressor draws no power.
pub fn cop_percent(heat_power_out: f64, electric_power_in: f64) -> f64 {
    if electric_power_in == 0.0 {
        return 0.0;
    }
    heat_power_out / electric_power_in * 100.0
}

pub fn power_from_air(heat_power_out: f64, electric_power_in: f64) -> f64 {
    (heat_power_out - electric_power_in).max(0.0)
}

/// Operating state label. Codes outside the table are an error, never a blank.
pub fn status_label(code: i64) -> Result<&'static str, MappingError> {
    match code {
        40 => Ok("Standby"),
        70 => Ok("Heating"),
        90 => Ok("Defrost"),
        130 => Ok("Cooling"),
        150 => Ok("Hot water"),
        160 => Ok("Anti legionella"),
        170 => Ok("Selftest"),
        180 => Ok("Manual control"),
        other => Err(MappingError::UnknownStatusCode(other)),
    }
}

fn numeric_value(value: f64, kind: SlotKind) -> SlotValue {
    match kind {
        // no cumulative counter is kept; the host accumulates from power
        SlotKind::EnergyAccumulating => SlotValue::text(format!("{:.1};0", value)),
        _ => SlotValue::text(format!("{:.1}", value)),
    }
}

/// Resolve one slot's value from `sample`.
pub fn resolve_slot(
    slot: &SlotDefinition,
    sample: &RemoteSample,
    nominal_power_w: u32,
) -> Result<SlotValue, MappingError> {
    match (slot.kind, slot.source) {
        (SlotKind::Switch, SlotSource::Field(key)) => Ok(SlotValue {
            state: sample.integer(key)?,
            text: String::new(),
        }),
        (_, SlotSource::StatusCode(key)) => Ok(SlotValue::text(status_label(sample.integer(key)?)?)),
        (SlotKind::Text, SlotSource::Field(key)) => Ok(SlotValue::text(sample.get(key)?.to_text())),
        (kind, SlotSource::Field(key)) => Ok(numeric_value(sample.number(key)?, kind)),
        (kind, SlotSource::Computed(metric)) => {
            Ok(numeric_value(metric.evaluate(sample, nominal_power_w)?, kind))
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MappingReport {
    pub updated: Vec<SlotId>,
    pub failed: Vec<(SlotId, MappingError)>,
}

pub struct SampleMapper;

impl SampleMapper {
    /// Push every resolvable slot the host has to the host.
    ///
    /// A slot that cannot be resolved is logged and keeps its last value; the
    /// remaining slots are still processed.
    pub fn apply(
        sample: &RemoteSample,
        slots: &[SlotDefinition],
        nominal_power_w: u32,
        host: &mut dyn SensorHost,
    ) -> MappingReport {
        let mut report = MappingReport::default();
        for slot in slots {
            if !host.contains(slot.id) {
                continue;
            }
            let value = match resolve_slot(slot, sample, nominal_power_w) {
                Ok(v) => v,
                Err(e) => {
                    warn!(slot = slot.id, name = slot.name, error = %e, "slot not updated");
                    report.failed.push((slot.id, e));
                    continue;
                }
            };
            debug!(slot = slot.id, name = slot.name, state = value.state, text = %value.text, "slot value");
            match host.update(slot.id, value) {
                Ok(()) => report.updated.push(slot.id),
                Err(e) => error!(slot = slot.id, name = slot.name, error = %e, "host rejected slot update"),
            }
        }
        report
    }
}
