use std::fmt;

use serde::{Deserialize, Serialize};

define_wire_tag! {
    /// Hardware module family.
    pub enum ModuleType {
        Any = 0,
        CsLightCtrl = 1,
        LbusWled = 2,
        CsmioIo = 3,
    }
}

/// A physical hardware unit attached to the master.
///
/// Two modules are only considered the same when every field matches, so a
/// board that is re-addressed or renamed shows up as a different module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Module {
    pub mac: String,
    pub sn: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub module_type: ModuleType,
    /// Position on the module's bus (CAN address, light bus channel, ...)
    #[serde(default)]
    pub index: u32,
}

/// Product naming for a module, as printed on the hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleProduct {
    pub name: String,
    pub model: &'static str,
}

impl Module {
    pub fn product(&self) -> ModuleProduct {
        let (name, model) = match self.module_type {
            ModuleType::CsmioIo => (format!("CSMIO-IO addr.{}", self.index), "CSMIO-IO CAN"),
            ModuleType::LbusWled => ("LBUS-WLED Driver".to_owned(), "csLEDPWM Driver"),
            ModuleType::CsLightCtrl => ("csLIGHT Controller".to_owned(), "csLightsCtrl F7x"),
            ModuleType::Any => ("Unknown".to_owned(), "Unknown"),
        };
        ModuleProduct { name, model }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Module(mac={}, sn={}, name={}, type={:?}, index={})",
            self.mac, self.sn, self.name, self.module_type, self.index
        )
    }
}
