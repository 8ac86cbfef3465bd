use crate::{AccState, AccessoryDevice, DeviceKind, DeviceState, HomeItem};

#[derive(Debug, Clone)]
pub struct RelayDevice {
    state: DeviceState,
    target_state: bool,
    current_state: Option<bool>,
}

impl RelayDevice {
    pub fn new(home_item: HomeItem) -> Self {
        Self {
            state: DeviceState::new(home_item),
            target_state: false,
            current_state: None,
        }
    }

    pub fn current_state(&self) -> Option<bool> {
        self.current_state
    }

    pub fn target_state(&self) -> bool {
        self.target_state
    }

    pub(crate) fn set_target_state(&mut self, on: bool) {
        self.target_state = on;
    }
}

impl AccessoryDevice for RelayDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Relay
    }

    fn state(&self) -> &DeviceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    fn apply_state(&mut self, state: &AccState) -> bool {
        let Some(value) = &state.state else {
            return false;
        };
        let Some(on) = value.as_bool() else {
            log::warn!("acc[{}] unexpected relay state: {:?}", state.acc_id, value);
            return false;
        };
        let changed = self.current_state != Some(on);
        self.current_state = Some(on);
        changed
    }
}
