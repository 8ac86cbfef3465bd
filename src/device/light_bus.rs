use crate::{Callback, CallbackId, CallbackSet, Module, Notifications};

/// A controller module driving one or more light buses, tracking the current
/// drawn on each channel.
#[derive(Debug, Clone)]
pub struct LightBusModule {
    module: Module,
    currents: Vec<f64>,
    callbacks: CallbackSet,
}

/// Result of storing a channel reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelUpdate {
    /// Stored, more channels of the same sweep are expected.
    Stored,
    /// Stored the last channel; observers should be told about the sweep.
    Completed,
    OutOfRange,
}

impl LightBusModule {
    pub fn new(module: Module, channel_count: usize) -> Self {
        Self {
            module,
            currents: vec![0.0; channel_count],
            callbacks: CallbackSet::new(),
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn channel_count(&self) -> usize {
        self.currents.len()
    }

    /// Current of a channel in amperes.
    pub fn current(&self, channel: usize) -> Option<f64> {
        self.currents.get(channel).copied()
    }

    pub fn currents(&self) -> &[f64] {
        &self.currents
    }

    pub(crate) fn set_current(&mut self, channel: usize, current: f64) -> ChannelUpdate {
        let Some(slot) = self.currents.get_mut(channel) else {
            return ChannelUpdate::OutOfRange;
        };
        *slot = current;
        if channel + 1 == self.currents.len() {
            ChannelUpdate::Completed
        } else {
            ChannelUpdate::Stored
        }
    }

    pub fn register_callback(&mut self, callback: Callback) -> CallbackId {
        self.callbacks.register(callback)
    }

    pub fn remove_callback(&mut self, id: CallbackId) -> bool {
        self.callbacks.unregister(id)
    }

    pub fn publish_updates(&self) {
        self.callbacks.publish();
    }

    pub fn schedule_updates(&self, pending: &mut Notifications) {
        self.callbacks.schedule(pending);
    }
}
