use crate::cli::ThemeAction;
use crate::error::AppError;
use crate::models::theme_types::{ResolvedTheme, ThemeConfig};
use crate::services::settings_service::SettingsStore;
use crate::services::theme_service::{ThemeController, ThemeEngine};

pub fn apply<S: SettingsStore>(
    controller: &mut ThemeController<S>,
    action: &ThemeAction,
) -> Result<ResolvedTheme, AppError> {
    match action {
        ThemeAction::Show { .. } => Ok(controller.current()),
        ThemeAction::Mode { mode } => controller.set_mode(*mode),
        ThemeAction::Brightness { value } => controller.set_brightness(*value),
        ThemeAction::Dim => controller.step_brightness(false),
        ThemeAction::Bright => controller.step_brightness(true),
        ThemeAction::Reset => controller.reset_brightness(),
        ThemeAction::Toggle => controller.toggle(),
    }
}

fn print_theme(config: ThemeConfig, theme: &ResolvedTheme, with_stylesheet: bool) {
    let c = &theme.colors;
    println!(
        "Theme: {:?} ({:?}), brightness {}%",
        config.mode, theme.variant, theme.brightness
    );
    for (name, value) in [
        ("background", &c.background),
        ("card", &c.card_background),
        ("input", &c.input_background),
        ("text", &c.text),
        ("secondary text", &c.secondary_text),
        ("accent", &c.accent),
        ("accent hover", &c.accent_hover),
        ("accent pressed", &c.accent_pressed),
        ("border", &c.border),
    ] {
        println!("  {:<15} {}", name, value);
    }
    if with_stylesheet {
        println!("\n{}", theme.stylesheet);
    }
}

pub fn run<S: SettingsStore>(action: ThemeAction, store: S) -> Result<(), AppError> {
    let mut controller = ThemeController::load(ThemeEngine::default(), store)?;
    let theme = apply(&mut controller, &action)?;
    let with_stylesheet = matches!(action, ThemeAction::Show { stylesheet: true });
    print_theme(controller.config(), &theme, with_stylesheet);
    Ok(())
}
