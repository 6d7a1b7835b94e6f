pub mod classify_types;
pub mod settings_types;
pub mod theme_types;
