//! Register layout codec for the Modbus master controller
//!
//! - [`byte_order`]: byte layouts and their permutation tables
//! - [`codec`]: typed getters and setters per layout
//! - [`layout`]: descriptor type tags
//! - [`marshal`]: whole-parameter conversion between native and register images

pub mod byte_order;
pub mod codec;
pub mod layout;
pub mod marshal;

pub use byte_order::ByteLayout;
pub use layout::{ElementLayout, LayoutTag, Primitive};
pub use marshal::{get_param_data, native_value, native_values, set_param_data};
