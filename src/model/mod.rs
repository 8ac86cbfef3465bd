#[macro_use]
mod wire_tag;
mod home_item;
mod module;

pub use home_item::*;
pub use module::*;
pub use wire_tag::TagError;
