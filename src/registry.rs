use thiserror::Error;

use crate::{
    AccState, AccType, AccessoryDevice, BlindDevice, ChannelUpdate, DeviceKind, HomeItem,
    LightBusModule, LightBusStatus, LightDevice, Module, ModuleEntry, Notifications, RelayDevice,
    Reply, WallSwitchDevice, WledDiag,
};

#[derive(Debug, Error, PartialEq)]
pub enum DispatchError {
    #[error("Received state update of unknown device, acc_id: {0}")]
    UnknownAccessory(u32),
    #[error("No device uses module with sn: {0}")]
    UnknownModule(String),
    #[error("Light bus index {index} out of range for module {sn} ({count} channels)")]
    LightBusChannel {
        sn: String,
        index: usize,
        count: usize,
    },
}

/// What a reply did to the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryUpdate {
    HomeModel {
        accessories: usize,
        devices: usize,
    },
    ModuleList {
        modules: usize,
        light_bus: usize,
    },
    Accessory {
        acc_id: u32,
        kind: DeviceKind,
        changed: bool,
    },
    Diagnostics {
        acc_id: u32,
        sn: String,
    },
    LightBus {
        sn: String,
        channel: usize,
        published: bool,
    },
}

/// The home model of one master and the devices built from it.
///
/// Mutating calls don't invoke observers themselves; they collect the
/// callbacks to run in a [`Notifications`] so callers can fire them once the
/// registry is no longer borrowed.
#[derive(Debug, Default)]
pub struct HomeRegistry {
    home_items: Vec<HomeItem>,
    lights: Vec<LightDevice>,
    blinds: Vec<BlindDevice>,
    relays: Vec<RelayDevice>,
    switches: Vec<WallSwitchDevice>,
    modules: Vec<Module>,
    light_bus: Vec<LightBusModule>,
}

impl HomeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(
        &mut self,
        reply: Reply,
        pending: &mut Notifications,
    ) -> Result<RegistryUpdate, DispatchError> {
        match reply {
            Reply::HomeModel(items) => Ok(self.load_home_model(items)),
            Reply::ModuleList(entries) => Ok(self.load_modules(entries)),
            Reply::AccState(state) => self.apply_acc_state(&state, pending),
            Reply::WledDiag(diag) => self.apply_wled_diag(&diag, pending),
            Reply::LightBusStatus(status) => self.apply_light_bus_status(&status, pending),
        }
    }

    /// Replaces all accessories and their devices.
    pub fn load_home_model(&mut self, items: Vec<HomeItem>) -> RegistryUpdate {
        self.home_items.clear();
        self.lights.clear();
        self.blinds.clear();
        self.relays.clear();
        self.switches.clear();

        for item in items {
            let id = item.id();
            let kind = match item.accessory.acc_type {
                AccType::Light => Some(DeviceKind::Light),
                AccType::WindowBlind => Some(DeviceKind::Blind),
                AccType::Relay => Some(DeviceKind::Relay),
                AccType::Switch | AccType::XorSwitch => Some(DeviceKind::WallSwitch),
                AccType::Any => None,
            };
            match kind {
                Some(kind) if self.contains(kind, id) => {
                    log::warn!("Duplicate {:?} accessory id {}, ignoring", kind, id);
                    continue;
                }
                Some(kind) => {
                    if let Some(other) = self.find(id) {
                        log::warn!(
                            "Accessory id {} used by both {:?} and {:?}, state updates go to {:?}",
                            id,
                            other,
                            kind,
                            other.min(kind)
                        );
                    }
                    match kind {
                        DeviceKind::Light => self.lights.push(LightDevice::new(item.clone())),
                        DeviceKind::Blind => self.blinds.push(BlindDevice::new(item.clone())),
                        DeviceKind::Relay => self.relays.push(RelayDevice::new(item.clone())),
                        DeviceKind::WallSwitch => {
                            self.switches.push(WallSwitchDevice::new(item.clone()))
                        }
                    }
                }
                None => log::warn!("Unknown accessory type: {:?}", item.accessory.acc_type),
            }
            self.home_items.push(item);
        }

        let update = RegistryUpdate::HomeModel {
            accessories: self.home_items.len(),
            devices: self.device_count(),
        };
        log::debug!("Home model loaded: {:?}", update);
        update
    }

    /// Replaces the hardware module list.
    pub fn load_modules(&mut self, entries: Vec<ModuleEntry>) -> RegistryUpdate {
        log::info!("Received module list");
        self.modules.clear();
        self.light_bus.clear();
        for entry in entries {
            let module = entry.module();
            if let Some(count) = entry.lbus_count.filter(|count| *count > 0) {
                self.light_bus
                    .push(LightBusModule::new(module.clone(), count as usize));
            }
            self.modules.push(module);
        }
        RegistryUpdate::ModuleList {
            modules: self.modules.len(),
            light_bus: self.light_bus.len(),
        }
    }

    pub fn apply_acc_state(
        &mut self,
        state: &AccState,
        pending: &mut Notifications,
    ) -> Result<RegistryUpdate, DispatchError> {
        if !state.valid {
            log::debug!("acc[{}] reported state is not valid", state.acc_id);
        }
        let device = self
            .device_mut(state.acc_id)
            .ok_or(DispatchError::UnknownAccessory(state.acc_id))?;
        let came_online = device.state_mut().mark_seen();
        let changed = device.apply_state(state) | came_online;
        if changed {
            device.schedule_updates(pending);
        }
        Ok(RegistryUpdate::Accessory {
            acc_id: state.acc_id,
            kind: device.kind(),
            changed,
        })
    }

    pub fn apply_wled_diag(
        &mut self,
        diag: &WledDiag,
        pending: &mut Notifications,
    ) -> Result<RegistryUpdate, DispatchError> {
        let light = self
            .lights
            .iter_mut()
            .find(|light| light.home_item().module_by_sn(&diag.sn).is_some())
            .ok_or_else(|| DispatchError::UnknownModule(diag.sn.clone()))?;
        if light.set_diag(diag.v_led, diag.t_ntc) {
            light.schedule_updates(pending);
        }
        log::debug!(
            "updated: WLED diag: sn:{} vled:{:.3} tntc:{:.3}",
            diag.sn,
            diag.v_led,
            diag.t_ntc
        );
        Ok(RegistryUpdate::Diagnostics {
            acc_id: light.acc_id(),
            sn: diag.sn.clone(),
        })
    }

    pub fn apply_light_bus_status(
        &mut self,
        status: &LightBusStatus,
        pending: &mut Notifications,
    ) -> Result<RegistryUpdate, DispatchError> {
        let sn = &status.module.sn;
        let module = self
            .light_bus
            .iter_mut()
            .find(|lb| lb.module().sn == *sn)
            .ok_or_else(|| DispatchError::UnknownModule(sn.clone()))?;
        let published = match module.set_current(status.lbus_index, status.current) {
            ChannelUpdate::Stored => false,
            ChannelUpdate::Completed => {
                module.schedule_updates(pending);
                true
            }
            ChannelUpdate::OutOfRange => {
                return Err(DispatchError::LightBusChannel {
                    sn: sn.clone(),
                    index: status.lbus_index,
                    count: module.channel_count(),
                })
            }
        };
        Ok(RegistryUpdate::LightBus {
            sn: sn.clone(),
            channel: status.lbus_index,
            published,
        })
    }

    /// Marks every device offline and schedules all observers, including
    /// those of devices that were already offline.
    pub fn mark_offline(&mut self, pending: &mut Notifications) {
        for device in self.devices_mut() {
            device.state_mut().mark_offline();
            device.schedule_updates(pending);
        }
        for module in &self.light_bus {
            module.schedule_updates(pending);
        }
    }

    pub fn clear(&mut self) {
        log::debug!("Clearing all devices!");
        self.home_items.clear();
        self.lights.clear();
        self.blinds.clear();
        self.relays.clear();
        self.switches.clear();
        self.modules.clear();
        self.light_bus.clear();
    }

    pub fn home_items(&self) -> &[HomeItem] {
        &self.home_items
    }

    pub fn accessory_ids(&self) -> Vec<u32> {
        self.home_items.iter().map(HomeItem::id).collect()
    }

    pub fn lights(&self) -> &[LightDevice] {
        &self.lights
    }

    pub fn blinds(&self) -> &[BlindDevice] {
        &self.blinds
    }

    pub fn relays(&self) -> &[RelayDevice] {
        &self.relays
    }

    pub fn wall_switches(&self) -> &[WallSwitchDevice] {
        &self.switches
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn light_bus_modules(&self) -> &[LightBusModule] {
        &self.light_bus
    }

    pub fn light(&self, acc_id: u32) -> Option<&LightDevice> {
        self.lights.iter().find(|d| d.acc_id() == acc_id)
    }

    pub fn light_mut(&mut self, acc_id: u32) -> Option<&mut LightDevice> {
        self.lights.iter_mut().find(|d| d.acc_id() == acc_id)
    }

    pub fn blind(&self, acc_id: u32) -> Option<&BlindDevice> {
        self.blinds.iter().find(|d| d.acc_id() == acc_id)
    }

    pub fn blind_mut(&mut self, acc_id: u32) -> Option<&mut BlindDevice> {
        self.blinds.iter_mut().find(|d| d.acc_id() == acc_id)
    }

    pub fn relay(&self, acc_id: u32) -> Option<&RelayDevice> {
        self.relays.iter().find(|d| d.acc_id() == acc_id)
    }

    pub fn relay_mut(&mut self, acc_id: u32) -> Option<&mut RelayDevice> {
        self.relays.iter_mut().find(|d| d.acc_id() == acc_id)
    }

    pub fn wall_switch(&self, acc_id: u32) -> Option<&WallSwitchDevice> {
        self.switches.iter().find(|d| d.acc_id() == acc_id)
    }

    pub fn wall_switch_mut(&mut self, acc_id: u32) -> Option<&mut WallSwitchDevice> {
        self.switches.iter_mut().find(|d| d.acc_id() == acc_id)
    }

    pub fn light_bus_module(&self, sn: &str) -> Option<&LightBusModule> {
        self.light_bus.iter().find(|lb| lb.module().sn == sn)
    }

    pub fn light_bus_module_mut(&mut self, sn: &str) -> Option<&mut LightBusModule> {
        self.light_bus.iter_mut().find(|lb| lb.module().sn == sn)
    }

    /// Kind of the device handling `acc_id`. Collections are searched lights
    /// first, then blinds, relays and wall switches.
    pub fn find(&self, acc_id: u32) -> Option<DeviceKind> {
        self.device(acc_id).map(|device| device.kind())
    }

    pub fn device(&self, acc_id: u32) -> Option<&dyn AccessoryDevice> {
        self.devices().find(|device| device.acc_id() == acc_id)
    }

    pub fn device_mut(&mut self, acc_id: u32) -> Option<&mut dyn AccessoryDevice> {
        self.devices_mut().find(|device| device.acc_id() == acc_id)
    }

    pub fn device_count(&self) -> usize {
        self.lights.len() + self.blinds.len() + self.relays.len() + self.switches.len()
    }

    pub fn devices(&self) -> impl Iterator<Item = &dyn AccessoryDevice> {
        self.lights
            .iter()
            .map(|d| d as &dyn AccessoryDevice)
            .chain(self.blinds.iter().map(|d| d as &dyn AccessoryDevice))
            .chain(self.relays.iter().map(|d| d as &dyn AccessoryDevice))
            .chain(self.switches.iter().map(|d| d as &dyn AccessoryDevice))
    }

    pub fn devices_mut(&mut self) -> impl Iterator<Item = &mut dyn AccessoryDevice> {
        self.lights
            .iter_mut()
            .map(|d| d as &mut dyn AccessoryDevice)
            .chain(self.blinds.iter_mut().map(|d| d as &mut dyn AccessoryDevice))
            .chain(self.relays.iter_mut().map(|d| d as &mut dyn AccessoryDevice))
            .chain(self.switches.iter_mut().map(|d| d as &mut dyn AccessoryDevice))
    }

    fn contains(&self, kind: DeviceKind, acc_id: u32) -> bool {
        match kind {
            DeviceKind::Light => self.light(acc_id).is_some(),
            DeviceKind::Blind => self.blind(acc_id).is_some(),
            DeviceKind::Relay => self.relay(acc_id).is_some(),
            DeviceKind::WallSwitch => self.wall_switch(acc_id).is_some(),
        }
    }
}
