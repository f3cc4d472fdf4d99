pub mod bench;
pub mod presets;
pub mod validate;
