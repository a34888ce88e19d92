//! In-process slot registry used when running outside a plugin host.

use crate::error::{AppError, Result};
use crate::sensors::{Presentation, SensorHost, SlotDefinition, SlotId, SlotValue};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct HostSlot {
    pub name: String,
    pub presentation: Presentation,
    pub value: Option<SlotValue>,
}

#[derive(Debug, Default)]
pub struct InMemoryHost {
    slots: BTreeMap<SlotId, HostSlot>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: SlotId) -> Option<&HostSlot> {
        self.slots.get(&id)
    }

    pub fn value_text(&self, id: SlotId) -> Option<&str> {
        self.get(id)
            .and_then(|s| s.value.as_ref())
            .map(|v| v.text.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Log every slot with its last value at debug level.
    pub fn dump_to_log(&self) {
        debug!(count = self.slots.len(), "slot count");
        for (id, slot) in &self.slots {
            match &slot.value {
                Some(v) => debug!(
                    slot = id,
                    name = %slot.name,
                    type_name = slot.presentation.type_name,
                    state = v.state,
                    text = %v.text,
                    "slot"
                ),
                None => debug!(
                    slot = id,
                    name = %slot.name,
                    type_name = slot.presentation.type_name,
                    "slot (no value yet)"
                ),
            }
        }
    }
}

impl SensorHost for InMemoryHost {
    fn contains(&self, id: SlotId) -> bool {
        self.slots.contains_key(&id)
    }

    fn create(&mut self, slot: &SlotDefinition, presentation: Presentation) -> Result<()> {
        if self.slots.contains_key(&slot.id) {
            return Err(AppError::Host(format!("slot {} already exists", slot.id)));
        }
        self.slots.insert(
            slot.id,
            HostSlot {
                name: slot.name.to_string(),
                presentation,
                value: None,
            },
        );
        Ok(())
    }

    fn update(&mut self, id: SlotId, value: SlotValue) -> Result<()> {
        let slot = self
            .slots
            .get_mut(&id)
            .ok_or_else(|| AppError::Host(format!("unknown slot {}", id)))?;
        info!(slot = id, name = %slot.name, state = value.state, text = %value.text, "slot updated");
        slot.value = Some(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::find;

    #[test]
    fn test_create_then_update() {
        let mut host = InMemoryHost::new();
        let room = find(1).unwrap();
        host.create(room, room.kind.presentation()).unwrap();

        assert!(host.contains(1));
        assert_eq!(host.value_text(1), None);

        host.update(1, SlotValue::text("21.3")).unwrap();
        assert_eq!(host.value_text(1), Some("21.3"));
    }

    #[test]
    fn test_duplicate_create_rejected() {
        let mut host = InMemoryHost::new();
        let room = find(1).unwrap();
        host.create(room, room.kind.presentation()).unwrap();
        assert!(host.create(room, room.kind.presentation()).is_err());
        assert_eq!(host.len(), 1);
    }

    #[test]
    fn test_update_unknown_slot() {
        let mut host = InMemoryHost::new();
        assert!(host.update(3, SlotValue::text("x")).is_err());
    }
}
