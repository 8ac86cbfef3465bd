mod callbacks;
#[cfg(feature = "client")]
mod commands;
mod config;
#[cfg(feature = "client")]
pub mod connection;
mod device;
#[cfg(feature = "client")]
mod master;
mod model;
mod protocol;
mod registry;
pub mod scale;

pub use callbacks::*;
#[cfg(feature = "client")]
pub use commands::*;
pub use config::*;
#[cfg(feature = "client")]
pub use connection::{CommandWriter, ConnectionError};
pub use device::*;
#[cfg(feature = "client")]
pub use master::*;
pub use model::*;
pub use protocol::*;
pub use registry::*;
