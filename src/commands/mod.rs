pub mod classifier;
pub mod settings;
pub mod theme;
