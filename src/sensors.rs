//! Static slot table and idempotent slot creation in the host registry.

use crate::device::BoilerTopology;
use crate::error::Result;
use crate::mapping::ComputedMetric;
use tracing::{debug, error, info};

pub type SlotId = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Temperature,
    /// kWh meter; the host accumulates energy from the reported power.
    EnergyAccumulating,
    Percentage,
    Text,
    Switch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSource {
    /// Numeric, boolean or text field copied from the sample.
    Field(&'static str),
    Computed(ComputedMetric),
    /// Numeric status code translated to a label.
    StatusCode(&'static str),
}

/// Which installations get a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wiring {
    Any,
    Hybrid,
    AllElectric,
}

impl Wiring {
    fn applies_to(self, topology: BoilerTopology) -> bool {
        match self {
            Wiring::Any => true,
            Wiring::Hybrid => topology.is_hybrid(),
            Wiring::AllElectric => !topology.is_hybrid(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDefinition {
    pub id: SlotId,
    pub name: &'static str,
    pub kind: SlotKind,
    pub source: SlotSource,
    pub wiring: Wiring,
}

/// Kind-specific metadata handed to the host on creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub type_name: &'static str,
    pub options: Vec<(&'static str, &'static str)>,
}

impl SlotKind {
    pub fn presentation(self) -> Presentation {
        let (type_name, options) = match self {
            SlotKind::Temperature => ("Temperature", vec![]),
            // mode 1: host derives energy from the instantaneous power
            SlotKind::EnergyAccumulating => ("kWh", vec![("EnergyMeterMode", "1")]),
            SlotKind::Percentage => ("Percentage", vec![]),
            SlotKind::Text => ("Text", vec![]),
            SlotKind::Switch => ("Switch", vec![("SwitchType", "OnOff")]),
        };
        Presentation { type_name, options }
    }
}

/// Value pushed to the host: a primary numeric state plus a text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotValue {
    pub state: i64,
    pub text: String,
}

impl SlotValue {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            state: 0,
            text: text.into(),
        }
    }

    pub fn switch(on: bool) -> Self {
        Self {
            state: i64::from(on),
            text: String::new(),
        }
    }
}

/// Host-side registry of addressable slots.
pub trait SensorHost {
    fn contains(&self, id: SlotId) -> bool;
    fn create(&mut self, slot: &SlotDefinition, presentation: Presentation) -> Result<()>;
    fn update(&mut self, id: SlotId, value: SlotValue) -> Result<()>;
}

const fn slot(
    id: SlotId,
    name: &'static str,
    kind: SlotKind,
    source: SlotSource,
    wiring: Wiring,
) -> SlotDefinition {
    SlotDefinition {
        id,
        name,
        kind,
        source,
        wiring,
    }
}

use SlotKind::*;
use SlotSource::*;

pub const SLOTS: [SlotDefinition; 16] = [
    slot(1, "Room temperature", Temperature, Field("t_room"), Wiring::Any),
    slot(2, "Room temperature setpoint", Temperature, Field("t_room_target"), Wiring::Any),
    slot(3, "House water temperature", Temperature, Field("t_water_house_in"), Wiring::Any),
    slot(4, "Heat pump water out", Temperature, Field("t_water_out"), Wiring::Any),
    slot(5, "Heat pump water in", Temperature, Field("t_water_in"), Wiring::Any),
    slot(6, "Air in temperature", Temperature, Field("t_air_in"), Wiring::Any),
    slot(7, "Air out temperature", Temperature, Field("t_air_out"), Wiring::Any),
    slot(8, "Electric power", EnergyAccumulating, Field("cm_mass_power_in"), Wiring::Any),
    slot(9, "Heat power", EnergyAccumulating, Field("cm_mass_power_out"), Wiring::Any),
    slot(10, "Power from air", EnergyAccumulating, Computed(ComputedMetric::PowerFromAir), Wiring::Any),
    slot(11, "COP", Percentage, Computed(ComputedMetric::CopPercent), Wiring::Any),
    slot(12, "Compressor usage", Percentage, Computed(ComputedMetric::CompressorUsagePercent), Wiring::Any),
    slot(13, "Compressor speed", Text, Field("rpm"), Wiring::Any),
    slot(14, "State", Text, StatusCode("state"), Wiring::Any),
    slot(15, "Gas boiler", Switch, Field("control_bridge_status_decoded_gas_boiler"), Wiring::Hybrid),
    slot(16, "Electric heater", Switch, Field("control_bridge_status_decoded_electric_heater"), Wiring::AllElectric),
];

pub fn find(id: SlotId) -> Option<&'static SlotDefinition> {
    SLOTS.iter().find(|s| s.id == id)
}

pub struct SensorRegistry;

impl SensorRegistry {
    /// Slots an installation with `topology` gets.
    pub fn slots_for(topology: BoilerTopology) -> impl Iterator<Item = &'static SlotDefinition> {
        SLOTS.iter().filter(move |s| s.wiring.applies_to(topology))
    }

    /// Create `slot` unless the host already has its id. Returns whether it was created.
    pub fn ensure_slot(host: &mut dyn SensorHost, slot: &SlotDefinition) -> Result<bool> {
        if host.contains(slot.id) {
            debug!(slot = slot.id, name = slot.name, "slot already present");
            return Ok(false);
        }
        host.create(slot, slot.kind.presentation())?;
        info!(slot = slot.id, name = slot.name, kind = ?slot.kind, "created slot");
        Ok(true)
    }

    /// Ensure every slot for `topology`; a failed creation is logged and skipped.
    pub fn ensure_slots(host: &mut dyn SensorHost, topology: BoilerTopology) -> usize {
        let mut created = 0;
        for slot in Self::slots_for(topology) {
            match Self::ensure_slot(host, slot) {
                Ok(true) => created += 1,
                Ok(false) => {}
                Err(e) => error!(slot = slot.id, name = slot.name, error = %e, "failed to create slot"),
            }
        }
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashSet};

    #[derive(Default)]
    struct RecordingHost {
        slots: BTreeMap<SlotId, Presentation>,
        creates: usize,
    }

    impl SensorHost for RecordingHost {
        fn contains(&self, id: SlotId) -> bool {
            self.slots.contains_key(&id)
        }

        fn create(&mut self, slot: &SlotDefinition, presentation: Presentation) -> Result<()> {
            self.creates += 1;
            self.slots.insert(slot.id, presentation);
            Ok(())
        }

        fn update(&mut self, _id: SlotId, _value: SlotValue) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_slot_ids_unique_and_in_range() {
        let ids: HashSet<SlotId> = SLOTS.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), SLOTS.len());
        assert!(SLOTS.iter().all(|s| (1..=16).contains(&s.id)));
    }

    #[test]
    fn test_hybrid_gets_gas_boiler_only() {
        let ids: Vec<SlotId> = SensorRegistry::slots_for(BoilerTopology::OpenThermBoiler)
            .map(|s| s.id)
            .collect();
        assert_eq!(ids.len(), 15);
        assert!(ids.contains(&15));
        assert!(!ids.contains(&16));
    }

    #[test]
    fn test_all_electric_gets_heater_only() {
        for topology in [BoilerTopology::NoBoiler, BoilerTopology::Unknown] {
            let ids: Vec<SlotId> = SensorRegistry::slots_for(topology).map(|s| s.id).collect();
            assert_eq!(ids.len(), 15);
            assert!(!ids.contains(&15));
            assert!(ids.contains(&16));
        }
    }

    #[test]
    fn test_ensure_slot_idempotent() {
        let mut host = RecordingHost::default();
        let room = find(1).unwrap();

        assert!(SensorRegistry::ensure_slot(&mut host, room).unwrap());
        let before = host.slots.get(&1).cloned();
        assert!(!SensorRegistry::ensure_slot(&mut host, room).unwrap());

        assert_eq!(host.creates, 1);
        assert_eq!(host.slots.get(&1).cloned(), before);
    }

    #[test]
    fn test_ensure_slots_twice_creates_once() {
        let mut host = RecordingHost::default();
        assert_eq!(SensorRegistry::ensure_slots(&mut host, BoilerTopology::OnOffBoiler), 15);
        assert_eq!(SensorRegistry::ensure_slots(&mut host, BoilerTopology::OnOffBoiler), 0);
        assert_eq!(host.creates, 15);
    }

    #[test]
    fn test_energy_presentation_has_meter_mode() {
        let p = SlotKind::EnergyAccumulating.presentation();
        assert_eq!(p.type_name, "kWh");
        assert!(p.options.contains(&("EnergyMeterMode", "1")));
        assert!(SlotKind::Temperature.presentation().options.is_empty());
    }
}
