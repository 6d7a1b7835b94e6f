pub mod classifier;
pub mod export_service;
pub mod fs_service;
pub mod result_log;
pub mod settings_service;
pub mod theme_service;
