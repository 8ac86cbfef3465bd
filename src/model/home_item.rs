use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::Module;

define_wire_tag! {
    /// Kind of accessory.
    pub enum AccType {
        Any = 0,
        Light = 1,
        Relay = 2,
        WindowBlind = 3,
        Switch = 4,
        XorSwitch = 5,
    }
}

define_wire_tag! {
    /// Capability a service offers.
    pub enum SvcType {
        Any = 0,
        Boolean = 1,
        Brightness = 2,
        Color = 3,
        Position = 4,
    }
}

define_wire_tag! {
    pub enum SvcRole {
        Any = 0,
        Actuator = 1,
        Initiator = 2,
    }
}

impl AccType {
    pub fn model_name(&self) -> &'static str {
        match self {
            AccType::Light => "Light",
            AccType::Relay => "Relay",
            AccType::WindowBlind => "WindowBlind",
            AccType::Switch => "Switch",
            AccType::XorSwitch => "XorSwitch",
            AccType::Any => "unknown",
        }
    }

    fn name_prefix(&self) -> &'static str {
        match self {
            AccType::Light => "csLIGHT",
            AccType::Relay => "csRELAY",
            AccType::WindowBlind => "csBLIND",
            AccType::Switch | AccType::XorSwitch => "csSWITCH",
            AccType::Any => "csACC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessoryLocation {
    pub room: String,
    pub zone: String,
    pub pos_x: i32,
    pub pos_y: i32,
    pub pos_z: i32,
}

impl AccessoryLocation {
    /// Area label: the room, or `room-zone` when the zone differs from the room.
    pub fn area(&self) -> String {
        if self.room == self.zone {
            self.room.clone()
        } else {
            format!("{}-{}", self.room, self.zone)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accessory {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub acc_type: AccType,
    #[serde(default)]
    pub location: AccessoryLocation,
}

impl Accessory {
    /// The configured name, or a synthesized one such as `csLIGHT_005` when the
    /// controller reports an empty name.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("{}_{:03}", self.acc_type.name_prefix(), self.id)
        } else {
            self.name.clone()
        }
    }

    pub fn unique_id(&self) -> String {
        format!("{}.{:03}", self.acc_type.model_name(), self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: u32,
    pub role: SvcRole,
    #[serde(rename = "type")]
    pub svc_type: SvcType,
}

/// A service together with the modules implementing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ServiceItemWire")]
pub struct HomeServiceItem {
    pub service: Service,
    modules: Vec<Module>,
}

#[derive(Deserialize)]
struct ServiceItemWire {
    service: Service,
    #[serde(default)]
    modules: Vec<Module>,
}

impl From<ServiceItemWire> for HomeServiceItem {
    fn from(wire: ServiceItemWire) -> Self {
        HomeServiceItem::new(wire.service, wire.modules)
    }
}

impl HomeServiceItem {
    /// Builds the item, dropping (and logging) repeated modules. The first
    /// occurrence of a module wins.
    pub fn new(service: Service, modules: impl IntoIterator<Item = Module>) -> Self {
        let mut item = Self {
            service,
            modules: Vec::new(),
        };
        for module in modules {
            item.push_module(module);
        }
        item
    }

    /// Returns false if an identical module is already part of the service.
    pub fn push_module(&mut self, module: Module) -> bool {
        if self.modules.contains(&module) {
            log::warn!("Duplicate module {} in service {}", module, self.service.id);
            return false;
        }
        self.modules.push(module);
        true
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }
}

/// An accessory and everything the controller knows about how it is wired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeItem {
    pub accessory: Accessory,
    #[serde(default)]
    pub services: Vec<HomeServiceItem>,
}

impl HomeItem {
    pub fn id(&self) -> u32 {
        self.accessory.id
    }

    pub fn has_brightness(&self) -> bool {
        self.brightness_service().is_some()
    }

    pub fn brightness_service(&self) -> Option<&HomeServiceItem> {
        self.services
            .iter()
            .find(|svc| svc.service.svc_type == SvcType::Brightness)
    }

    pub fn module_by_sn(&self, sn: &str) -> Option<&Module> {
        self.services
            .iter()
            .flat_map(|svc| svc.modules())
            .find(|module| module.sn == sn)
    }

    /// Every module used by any of the services, each reported once.
    pub fn all_modules(&self) -> Vec<&Module> {
        let mut seen = HashSet::new();
        self.services
            .iter()
            .flat_map(|svc| svc.modules())
            .filter(|module| seen.insert(*module))
            .collect()
    }
}
