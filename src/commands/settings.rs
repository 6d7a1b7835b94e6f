use crate::cli::SettingsAction;
use crate::error::AppError;
use crate::models::settings_types::AppSettings;
use crate::services::settings_service::SettingsStore;

/// Batch sizes offered by the settings dialog.
pub const BATCH_SIZE_CHOICES: [usize; 6] = [1, 4, 8, 16, 32, 64];

pub fn apply<S: SettingsStore>(action: &SettingsAction, store: &S) -> Result<AppSettings, AppError> {
    match action {
        SettingsAction::Show | SettingsAction::Recent => store.load(),
        SettingsAction::BatchSize { size } => {
            if !BATCH_SIZE_CHOICES.contains(size) {
                return Err(AppError::Settings(format!(
                    "batch size must be one of {:?}",
                    BATCH_SIZE_CHOICES
                )));
            }
            store.update(|s| s.batch_size = *size)
        }
        SettingsAction::ClearRecent => store.update(|s| s.recent_paths.clear()),
    }
}

pub fn run<S: SettingsStore>(action: SettingsAction, store: &S) -> Result<(), AppError> {
    let settings = apply(&action, store)?;
    match action {
        SettingsAction::Show => println!("{}", serde_json::to_string_pretty(&settings)?),
        SettingsAction::Recent if settings.recent_paths.is_empty() => println!("No recent paths"),
        SettingsAction::Recent => {
            for path in settings.recent_paths.iter() {
                println!("{}", path);
            }
        }
        SettingsAction::BatchSize { size } => println!("Batch size set to {}", size),
        SettingsAction::ClearRecent => println!("Recent paths cleared"),
    }
    Ok(())
}
