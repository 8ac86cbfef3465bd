use crate::{AccState, AccessoryDevice, DeviceKind, DeviceState, HomeItem, StateValue};

/// A wall switch (plain or exclusive-or). Read only: the master reports what
/// the switch does, it can't be commanded.
#[derive(Debug, Clone)]
pub struct WallSwitchDevice {
    state: DeviceState,
    current_value: Option<StateValue>,
}

impl WallSwitchDevice {
    pub fn new(home_item: HomeItem) -> Self {
        Self {
            state: DeviceState::new(home_item),
            current_value: None,
        }
    }

    /// The raw value last reported: a boolean for plain switches, a number
    /// for multi-way switches.
    pub fn current_value(&self) -> Option<&StateValue> {
        self.current_value.as_ref()
    }

    pub fn current_state(&self) -> Option<bool> {
        self.current_value.as_ref().and_then(StateValue::as_bool)
    }
}

impl AccessoryDevice for WallSwitchDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::WallSwitch
    }

    fn state(&self) -> &DeviceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    fn apply_state(&mut self, state: &AccState) -> bool {
        let Some(value) = &state.value else {
            return false;
        };
        log::debug!("update of wall switch {} to {:?}", state.acc_id, value);
        let changed = self.current_value.as_ref() != Some(value);
        self.current_value = Some(value.clone());
        changed
    }
}
