use serde::{de::DeserializeOwned, Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::{HomeItem, Module, ModuleType};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to parse json (exc: {source} line: {line} column: {column})")]
    InvalidJson {
        line: usize,
        column: usize,
        source: serde_json::Error,
    },
    #[error("Message carries no rpl-type")]
    MissingReplyType,
    #[error("Unknown rpl-type: {0}")]
    UnknownReplyType(String),
    #[error("Invalid {rpl_type} payload: {source}")]
    InvalidPayload {
        rpl_type: &'static str,
        source: serde_json::Error,
    },
}

/// Commands sent to the master. Each one is written as a single JSON line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command")]
pub enum Command {
    GetHomeModel,
    GetModules,
    GetAccState {
        #[serde(rename = "acc-id", serialize_with = "id_as_string")]
        acc_id: u32,
    },
    AccSetValue {
        #[serde(rename = "acc-id", serialize_with = "id_as_string")]
        acc_id: u32,
        #[serde(rename = "evt-type")]
        evt_type: SetValueType,
        #[serde(rename = "evt-value")]
        evt_value: SetValue,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SetValueType {
    SetBrightness,
    SetBool,
    SetPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SetValue {
    Bool(bool),
    Level(f64),
}

// the master expects accessory ids as strings in commands
fn id_as_string<S: Serializer>(id: &u32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(id)
}

impl Command {
    pub fn state_refresh(acc_id: u32) -> Self {
        Command::GetAccState { acc_id }
    }

    pub fn set_bool(acc_id: u32, value: bool) -> Self {
        Command::AccSetValue {
            acc_id,
            evt_type: SetValueType::SetBool,
            evt_value: SetValue::Bool(value),
        }
    }

    pub fn set_brightness(acc_id: u32, value: f64) -> Self {
        Command::AccSetValue {
            acc_id,
            evt_type: SetValueType::SetBrightness,
            evt_value: SetValue::Level(value),
        }
    }

    pub fn set_position(acc_id: u32, value: f64) -> Self {
        Command::AccSetValue {
            acc_id,
            evt_type: SetValueType::SetPosition,
            evt_value: SetValue::Level(value),
        }
    }

    /// Compact JSON without the line terminator.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A loosely typed state field of an `acc-state` reply. Relays report
/// booleans, blinds report motion names and wall switches booleans or numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl StateValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateValue::Bool(b) => Some(*b),
            StateValue::Number(n) => Some(*n != 0.0),
            StateValue::Text(t) => match t.as_str() {
                "true" | "on" | "1" => Some(true),
                "false" | "off" | "0" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StateValue::Text(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccState {
    #[serde(rename = "acc-id")]
    pub acc_id: u32,
    pub valid: bool,
    pub brightness: Option<f64>,
    pub on: Option<bool>,
    #[serde(rename = "currPos")]
    pub curr_pos: Option<f64>,
    pub state: Option<StateValue>,
    pub value: Option<StateValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WledDiag {
    pub sn: String,
    #[serde(rename = "vLed")]
    pub v_led: f64,
    #[serde(rename = "tNtc")]
    pub t_ntc: f64,
}

/// One entry of a `module-list` reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModuleEntry {
    pub mac: String,
    pub sn: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub module_type: ModuleType,
    #[serde(default)]
    pub index: u32,
    #[serde(rename = "lbusCount")]
    pub lbus_count: Option<u32>,
}

impl ModuleEntry {
    pub fn module(&self) -> Module {
        Module {
            mac: self.mac.clone(),
            sn: self.sn.clone(),
            name: self.name.clone(),
            module_type: self.module_type,
            index: self.index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModuleSn {
    pub sn: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LightBusStatus {
    pub module: ModuleSn,
    #[serde(rename = "lbusIndex")]
    pub lbus_index: usize,
    pub current: f64,
}

/// A decoded message from the master.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    AccState(AccState),
    HomeModel(Vec<HomeItem>),
    WledDiag(WledDiag),
    ModuleList(Vec<ModuleEntry>),
    LightBusStatus(LightBusStatus),
}

#[derive(Deserialize)]
struct HomeModelWire {
    accessories: Vec<Value>,
}

#[derive(Deserialize)]
struct ModuleListWire {
    modules: Vec<Value>,
}

impl Reply {
    pub fn rpl_type(&self) -> &'static str {
        match self {
            Reply::AccState(_) => "acc-state",
            Reply::HomeModel(_) => "home-model",
            Reply::WledDiag(_) => "wled-diag",
            Reply::ModuleList(_) => "module-list",
            Reply::LightBusStatus(_) => "lbus-status",
        }
    }

    /// Decodes one line received from the master.
    ///
    /// Entries of `home-model` and `module-list` that can't be mapped (e.g. an
    /// unknown type tag) are logged and left out instead of failing the whole
    /// reply.
    pub fn decode(line: &[u8]) -> Result<Reply, DecodeError> {
        let mut value: Value =
            serde_json::from_slice(line).map_err(|source| DecodeError::InvalidJson {
                line: source.line(),
                column: source.column(),
                source,
            })?;

        let rpl_type = match value.get("rpl-type").and_then(Value::as_str) {
            Some(rpl_type) => rpl_type.to_owned(),
            None => return Err(DecodeError::MissingReplyType),
        };
        if let Some(obj) = value.as_object_mut() {
            obj.remove("rpl-type");
        }

        let reply = match rpl_type.as_str() {
            "acc-state" => Reply::AccState(payload("acc-state", value)?),
            "home-model" => {
                let wire: HomeModelWire = payload("home-model", value)?;
                Reply::HomeModel(entries("home-model", wire.accessories))
            }
            "wled-diag" => Reply::WledDiag(payload("wled-diag", value)?),
            "module-list" => {
                let wire: ModuleListWire = payload("module-list", value)?;
                Reply::ModuleList(entries("module-list", wire.modules))
            }
            "lbus-status" => Reply::LightBusStatus(payload("lbus-status", value)?),
            _ => return Err(DecodeError::UnknownReplyType(rpl_type)),
        };
        Ok(reply)
    }
}

fn payload<T: DeserializeOwned>(rpl_type: &'static str, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::InvalidPayload { rpl_type, source })
}

fn entries<T: DeserializeOwned>(rpl_type: &'static str, values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<T>(entry) {
            Ok(item) => Some(item),
            Err(err) => {
                log::warn!("Skipping {} entry: {}", rpl_type, err);
                None
            }
        })
        .collect()
}
