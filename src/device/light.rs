use crate::{scale::clamp_unit, AccState, AccessoryDevice, DeviceKind, DeviceState, HomeItem};

/// A dimmable or switchable light.
#[derive(Debug, Clone)]
pub struct LightDevice {
    state: DeviceState,
    target_state: Option<bool>,
    current_state: Option<bool>,
    target_brightness: f64,
    current_brightness: f64,
    diag_vled: Option<f64>,
    diag_tntc: Option<f64>,
}

impl LightDevice {
    pub fn new(home_item: HomeItem) -> Self {
        Self {
            state: DeviceState::new(home_item),
            target_state: None,
            current_state: None,
            target_brightness: 0.0,
            current_brightness: 0.0,
            diag_vled: None,
            diag_tntc: None,
        }
    }

    pub fn current_state(&self) -> Option<bool> {
        self.current_state
    }

    pub fn current_brightness(&self) -> f64 {
        self.current_brightness
    }

    pub fn target_state(&self) -> Option<bool> {
        self.target_state
    }

    pub fn target_brightness(&self) -> f64 {
        self.target_brightness
    }

    /// LED supply voltage reported by the driver module.
    pub fn vled(&self) -> Option<f64> {
        self.diag_vled
    }

    /// Driver temperature (NTC) reported by the driver module.
    pub fn tntc(&self) -> Option<f64> {
        self.diag_tntc
    }

    /// Updates brightness and on state together so a reply carrying both
    /// results in a single change.
    pub(crate) fn set_current(&mut self, brightness: Option<f64>, on: Option<bool>) -> bool {
        let mut changed = false;
        if let Some(brightness) = brightness.map(clamp_unit) {
            changed |= self.current_brightness != brightness;
            self.current_brightness = brightness;
        }
        if let Some(on) = on {
            changed |= self.current_state != Some(on);
            self.current_state = Some(on);
        }
        changed
    }

    pub(crate) fn set_diag(&mut self, vled: f64, tntc: f64) -> bool {
        let changed = self.diag_vled != Some(vled) || self.diag_tntc != Some(tntc);
        self.diag_vled = Some(vled);
        self.diag_tntc = Some(tntc);
        changed
    }

    pub(crate) fn set_target_state(&mut self, on: bool) {
        self.target_state = Some(on);
    }

    pub(crate) fn set_target_brightness(&mut self, brightness: f64) {
        self.target_brightness = clamp_unit(brightness);
    }
}

impl AccessoryDevice for LightDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Light
    }

    fn state(&self) -> &DeviceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    fn apply_state(&mut self, state: &AccState) -> bool {
        self.set_current(state.brightness, state.on)
    }
}
