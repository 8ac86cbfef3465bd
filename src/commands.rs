use std::sync::Arc;

use parking_lot::Mutex;

use crate::{scale::clamp_unit, Command, CommandWriter, ConnectionError, HomeRegistry};

/// Sends target value changes and refresh requests to the master.
///
/// The master doesn't acknowledge commands. A successful send only means the
/// line was written; the device's current values follow once the master
/// reports the new state. The requested target is remembered on the device.
#[derive(Clone)]
pub struct CommandSender {
    writer: CommandWriter,
    registry: Arc<Mutex<HomeRegistry>>,
}

impl CommandSender {
    pub fn new(writer: CommandWriter, registry: Arc<Mutex<HomeRegistry>>) -> Self {
        Self { writer, registry }
    }

    /// Switches a light or relay.
    pub async fn request_target_boolean(
        &self,
        acc_id: u32,
        value: bool,
    ) -> Result<(), ConnectionError> {
        self.writer.send(&Command::set_bool(acc_id, value)).await?;
        let mut registry = self.registry.lock();
        if let Some(light) = registry.light_mut(acc_id) {
            light.set_target_state(value);
        } else if let Some(relay) = registry.relay_mut(acc_id) {
            relay.set_target_state(value);
        }
        Ok(())
    }

    /// Dims a light, `value` is clamped into `0.0..=1.0`.
    pub async fn request_target_brightness(
        &self,
        acc_id: u32,
        value: f64,
    ) -> Result<(), ConnectionError> {
        let value = clamp_unit(value);
        self.writer
            .send(&Command::set_brightness(acc_id, value))
            .await?;
        if let Some(light) = self.registry.lock().light_mut(acc_id) {
            light.set_target_brightness(value);
        }
        Ok(())
    }

    /// Moves a blind, `value` is clamped into `0.0..=1.0` (closed..open).
    pub async fn request_target_position(
        &self,
        acc_id: u32,
        value: f64,
    ) -> Result<(), ConnectionError> {
        let value = clamp_unit(value);
        self.writer
            .send(&Command::set_position(acc_id, value))
            .await?;
        if let Some(blind) = self.registry.lock().blind_mut(acc_id) {
            blind.set_target_position(value);
        }
        Ok(())
    }

    /// Asks the master to report the state of one accessory again.
    pub async fn request_state_refresh(&self, acc_id: u32) -> Result<(), ConnectionError> {
        log::debug!("Update request for accessory {}", acc_id);
        self.writer.send(&Command::state_refresh(acc_id)).await
    }

    /// Requests a state refresh for every accessory of the home model.
    /// Stops at the first failed write.
    pub async fn refresh_all(&self) -> Result<(), ConnectionError> {
        let ids = self.registry.lock().accessory_ids();
        for acc_id in ids {
            self.request_state_refresh(acc_id).await?;
        }
        Ok(())
    }
}
