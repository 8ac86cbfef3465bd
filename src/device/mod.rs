mod blind;
mod light;
mod light_bus;
mod relay;
mod wall_switch;

pub use blind::*;
pub use light::*;
pub use light_bus::*;
pub use relay::*;
pub use wall_switch::*;

use chrono::{DateTime, Utc};

use crate::{AccState, Callback, CallbackId, CallbackSet, HomeItem, Notifications};

/// The collection an accessory device lives in, ordered by lookup priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceKind {
    Light,
    Blind,
    Relay,
    WallSwitch,
}

/// State every accessory device carries regardless of its kind.
#[derive(Debug, Clone)]
pub struct DeviceState {
    home_item: HomeItem,
    online: bool,
    last_update: Option<DateTime<Utc>>,
    callbacks: CallbackSet,
}

impl DeviceState {
    pub fn new(home_item: HomeItem) -> Self {
        Self {
            home_item,
            online: false,
            last_update: None,
            callbacks: CallbackSet::new(),
        }
    }

    /// Records that the master reported on this device. Returns true if the
    /// device just came online.
    pub(crate) fn mark_seen(&mut self) -> bool {
        self.last_update = Some(Utc::now());
        let changed = !self.online;
        self.online = true;
        changed
    }

    pub(crate) fn mark_offline(&mut self) {
        self.online = false;
    }
}

pub trait AccessoryDevice: Send + Sync {
    fn kind(&self) -> DeviceKind;
    fn state(&self) -> &DeviceState;
    fn state_mut(&mut self) -> &mut DeviceState;

    /// Applies the fields of an `acc-state` reply that concern this kind of
    /// device. Returns true if anything observable changed.
    fn apply_state(&mut self, state: &AccState) -> bool;

    fn home_item(&self) -> &HomeItem {
        &self.state().home_item
    }

    fn acc_id(&self) -> u32 {
        self.state().home_item.accessory.id
    }

    fn online(&self) -> bool {
        self.state().online
    }

    fn last_update(&self) -> Option<DateTime<Utc>> {
        self.state().last_update
    }

    fn register_callback(&mut self, callback: Callback) -> CallbackId {
        self.state_mut().callbacks.register(callback)
    }

    fn remove_callback(&mut self, id: CallbackId) -> bool {
        self.state_mut().callbacks.unregister(id)
    }

    fn publish_updates(&self) {
        self.state().callbacks.publish();
    }

    fn schedule_updates(&self, pending: &mut Notifications) {
        self.state().callbacks.schedule(pending);
    }
}
