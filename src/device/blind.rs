use crate::{scale::clamp_unit, AccState, AccessoryDevice, DeviceKind, DeviceState, HomeItem};

/// What a blind motor is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlindMotion {
    Opening,
    Closing,
    Stopped,
}

impl BlindMotion {
    pub fn from_wire(state: &str) -> Self {
        match state {
            "BlindUp" => BlindMotion::Opening,
            "BlindDn" => BlindMotion::Closing,
            _ => BlindMotion::Stopped,
        }
    }
}

/// A window blind. Positions run from 0.0 (closed) to 1.0 (open).
#[derive(Debug, Clone)]
pub struct BlindDevice {
    state: DeviceState,
    target_position: f64,
    current_position: f64,
    motion: Option<BlindMotion>,
    raw_state: Option<String>,
}

impl BlindDevice {
    pub fn new(home_item: HomeItem) -> Self {
        Self {
            state: DeviceState::new(home_item),
            target_position: 0.0,
            current_position: 0.0,
            motion: None,
            raw_state: None,
        }
    }

    pub fn current_position(&self) -> f64 {
        self.current_position
    }

    pub fn target_position(&self) -> f64 {
        self.target_position
    }

    pub fn motion(&self) -> Option<BlindMotion> {
        self.motion
    }

    /// The state tag exactly as the master reported it, e.g. `BlindUp`.
    pub fn current_state(&self) -> Option<&str> {
        self.raw_state.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.current_position == 0.0
    }

    pub fn is_opening(&self) -> bool {
        self.motion == Some(BlindMotion::Opening)
    }

    pub fn is_closing(&self) -> bool {
        self.motion == Some(BlindMotion::Closing)
    }

    pub(crate) fn set_target_position(&mut self, position: f64) {
        self.target_position = clamp_unit(position);
    }
}

impl AccessoryDevice for BlindDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Blind
    }

    fn state(&self) -> &DeviceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    fn apply_state(&mut self, state: &AccState) -> bool {
        let mut changed = false;
        if let Some(pos) = state.curr_pos.map(clamp_unit) {
            log::debug!("acc[{}] currPos: {:.2}", state.acc_id, pos);
            changed |= self.current_position != pos;
            self.current_position = pos;
        }
        if let Some(value) = &state.state {
            match value.as_text() {
                Some(text) => {
                    log::debug!("acc[{}] state: {}", state.acc_id, text);
                    changed |= self.raw_state.as_deref() != Some(text);
                    self.motion = Some(BlindMotion::from_wire(text));
                    self.raw_state = Some(text.to_owned());
                }
                None => log::warn!("acc[{}] unexpected blind state: {:?}", state.acc_id, value),
            }
        }
        changed
    }
}
