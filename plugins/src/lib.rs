pub mod factory;
pub mod permission;
pub mod records;
pub mod renderers;
