//! Theme palette derivation and stylesheet generation.
//!
//! `adjust_color` and `ThemeEngine::resolve` are pure. `ThemeController` is the
//! stateful half that owns the user's choice and persists it.

use crate::error::AppError;
use crate::models::theme_types::{
    clamp_brightness, Palette, ResolvedTheme, ThemeConfig, ThemeMode, ThemeVariant,
    BRIGHTNESS_STEP, DEFAULT_BRIGHTNESS,
};
use crate::services::settings_service::SettingsStore;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Parse `#rrggbb` (the `#` is optional, hex digits in either case).
    pub fn parse_hex(hex: &str) -> Result<Self, AppError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(AppError::InvalidColor(hex.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| AppError::InvalidColor(hex.to_string()))
        };
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Below 1.0 every channel is scaled down; above 1.0 every channel moves
    /// toward 255 by `(255 - c) * (factor - 1)`. Results are floored.
    pub fn adjust(self, factor: f64) -> Self {
        let channel = |c: u8| -> u8 {
            let c = c as f64;
            let adjusted = if factor < 1.0 {
                c * factor
            } else if factor > 1.0 {
                (c + (255.0 - c) * (factor - 1.0)).min(255.0)
            } else {
                c
            };
            adjusted.max(0.0).floor() as u8
        };
        Self {
            r: channel(self.r),
            g: channel(self.g),
            b: channel(self.b),
        }
    }
}

/// Brightness-adjust a `#rrggbb` color. Output is lower-case `#rrggbb`.
pub fn adjust_color(hex: &str, factor: f64) -> Result<String, AppError> {
    Ok(Rgb::parse_hex(hex)?.adjust(factor).to_hex())
}

struct BasePalette {
    background: &'static str,
    card_background: &'static str,
    input_background: &'static str,
    text: &'static str,
    secondary_text: &'static str,
    accent: &'static str,
    accent_hover: &'static str,
    accent_pressed: &'static str,
    border: &'static str,
}

const DARK_PALETTE: BasePalette = BasePalette {
    background: "#1e1e1e",
    card_background: "#2d2d2d",
    input_background: "#333333",
    text: "#ffffff",
    secondary_text: "#bbbbbb",
    accent: "#0071e3",
    accent_hover: "#0077ED",
    accent_pressed: "#005BBB",
    border: "#3d3d3d",
};

const LIGHT_PALETTE: BasePalette = BasePalette {
    background: "#f5f5f7",
    card_background: "#ffffff",
    input_background: "#e7e7e7",
    text: "#121212",
    secondary_text: "#555555",
    accent: "#0071e3",
    accent_hover: "#0077ED",
    accent_pressed: "#005BBB",
    border: "#d1d1d1",
};

/// Colors that do not follow the brightness setting.
struct FixedColors {
    disabled_background: &'static str,
    disabled_text: &'static str,
    secondary_hover: &'static str,
    slider_groove: &'static str,
}

fn base_palette(variant: ThemeVariant) -> &'static BasePalette {
    match variant {
        ThemeVariant::Dark => &DARK_PALETTE,
        ThemeVariant::Light => &LIGHT_PALETTE,
    }
}

fn fixed_colors(variant: ThemeVariant) -> FixedColors {
    match variant {
        ThemeVariant::Dark => FixedColors {
            disabled_background: "#555555",
            disabled_text: "#888888",
            secondary_hover: "#444444",
            slider_groove: "#555555",
        },
        ThemeVariant::Light => FixedColors {
            disabled_background: "#c0c0c0",
            disabled_text: "#888888",
            secondary_hover: "#d5d5d5",
            slider_groove: "#c0c0c0",
        },
    }
}

/// Apply `brightness` percent to every color of the variant's base palette.
pub fn palette(variant: ThemeVariant, brightness: u8) -> Palette {
    let factor = brightness as f64 / 100.0;
    let base = base_palette(variant);
    // Base palette entries are compile-time constants, always valid hex.
    let adjust = |hex: &str| {
        Rgb::parse_hex(hex)
            .map(|c| c.adjust(factor).to_hex())
            .unwrap_or_else(|_| hex.to_string())
    };
    Palette {
        background: adjust(base.background),
        card_background: adjust(base.card_background),
        input_background: adjust(base.input_background),
        text: adjust(base.text),
        secondary_text: adjust(base.secondary_text),
        accent: adjust(base.accent),
        accent_hover: adjust(base.accent_hover),
        accent_pressed: adjust(base.accent_pressed),
        border: adjust(base.border),
    }
}

pub fn stylesheet(variant: ThemeVariant, colors: &Palette) -> String {
    let fixed = fixed_colors(variant);
    let (button_text, selected_text, secondary_button_text) = match variant {
        ThemeVariant::Dark => (colors.text.as_str(), String::new(), String::new()),
        ThemeVariant::Light => (
            "white",
            "\n    color: white;".to_string(),
            format!("\n    color: {};", colors.text),
        ),
    };

    format!(
        r#"QMainWindow, QDialog, QWidget#splashContent {{
    background-color: {bg};
}}
QLabel {{
    color: {text};
    font-family: 'SF Pro Display', 'Helvetica Neue', Arial, sans-serif;
}}
QLineEdit, QComboBox, QListWidget {{
    padding: 8px;
    border-radius: 6px;
    background-color: {input_bg};
    color: {text};
    border: 1px solid {border};
    font-size: 13px;
}}
QPushButton {{
    padding: 10px 15px;
    border-radius: 6px;
    background-color: {accent};
    color: {button_text};
    border: none;
    font-weight: bold;
    font-size: 13px;
}}
QPushButton:hover {{
    background-color: {accent_hover};
}}
QPushButton:pressed {{
    background-color: {accent_pressed};
}}
QPushButton:disabled {{
    background-color: {disabled_bg};
    color: {disabled_text};
}}
QPushButton#secondaryButton {{
    background-color: {input_bg};{secondary_button_text}
}}
QPushButton#secondaryButton:hover {{
    background-color: {secondary_hover};
}}
QToolBar {{
    background-color: {card_bg};
    border: none;
    spacing: 10px;
    padding: 5px;
}}
QStatusBar {{
    background-color: {card_bg};
    color: {secondary_text};
    border-top: 1px solid {border};
}}
QProgressBar {{
    border: none;
    border-radius: 6px;
    background-color: {input_bg};
    text-align: center;
    color: {text};
    font-weight: bold;
}}
QProgressBar::chunk {{
    background-color: {accent};
    border-radius: 6px;
}}
QListWidget {{
    background-color: {input_bg};
    border-radius: 6px;
    color: {text};
    padding: 5px;
}}
QListWidget::item {{
    border-radius: 4px;
    padding: 8px;
    margin: 2px 0px;
}}
QListWidget::item:selected {{
    background-color: {accent};{selected_text}
}}
QScrollArea {{
    border: none;
    background-color: {bg};
}}
QFrame#card {{
    background-color: {card_bg};
    border-radius: 10px;
    border: 1px solid {border};
}}
QFrame#resultItem {{
    background-color: {card_bg};
    border-radius: 6px;
    border: 1px solid {border};
    padding: 10px;
    margin: 5px;
}}
QSlider::groove:horizontal {{
    height: 8px;
    background: {groove};
    border-radius: 4px;
}}
QSlider::handle:horizontal {{
    background: {accent};
    border: none;
    width: 18px;
    margin: -5px 0;
    border-radius: 9px;
}}
QSlider::add-page:horizontal {{
    background: {groove};
    border-radius: 4px;
}}
QSlider::sub-page:horizontal {{
    background: {accent};
    border-radius: 4px;
}}
QCheckBox {{
    color: {text};
}}
QCheckBox::indicator {{
    width: 18px;
    height: 18px;
    border-radius: 4px;
    border: 1px solid {accent};
}}
QCheckBox::indicator:checked {{
    background-color: {accent};
}}
QMessageBox {{
    background-color: {bg};
}}
QMessageBox QLabel {{
    color: {text};
}}
QMenu {{
    background-color: {card_bg};
    color: {text};
    border: 1px solid {border};
    border-radius: 6px;
    padding: 5px;
}}
QMenu::item {{
    padding: 6px 25px 6px 20px;
    border-radius: 4px;
}}
QMenu::item:selected {{
    background-color: {accent};{selected_text}
}}
QMenuBar {{
    background-color: {bg};
    color: {text};
}}
QMenuBar::item {{
    padding: 5px 10px;
    border-radius: 4px;
}}
QMenuBar::item:selected {{
    background-color: {accent};{selected_text}
}}
QToolTip {{
    background-color: {card_bg};
    color: {text};
    border: 1px solid {border};
    border-radius: 4px;
    padding: 5px;
}}
"#,
        bg = colors.background,
        card_bg = colors.card_background,
        input_bg = colors.input_background,
        text = colors.text,
        secondary_text = colors.secondary_text,
        accent = colors.accent,
        accent_hover = colors.accent_hover,
        accent_pressed = colors.accent_pressed,
        border = colors.border,
        button_text = button_text,
        disabled_bg = fixed.disabled_background,
        disabled_text = fixed.disabled_text,
        secondary_hover = fixed.secondary_hover,
        secondary_button_text = secondary_button_text,
        groove = fixed.slider_groove,
        selected_text = selected_text,
    )
}

/// Source of the operating system's light/dark preference for `Auto` mode.
pub trait SystemAppearance: Send + Sync {
    fn is_dark(&self) -> bool;
}

/// Appearance that never changes. Dark is the fallback when nothing can be
/// detected.
#[derive(Clone, Copy, Debug)]
pub struct StaticAppearance {
    pub dark: bool,
}

impl Default for StaticAppearance {
    fn default() -> Self {
        Self { dark: true }
    }
}

impl SystemAppearance for StaticAppearance {
    fn is_dark(&self) -> bool {
        self.dark
    }
}

#[derive(Clone)]
pub struct ThemeEngine {
    appearance: Arc<dyn SystemAppearance>,
}

impl Default for ThemeEngine {
    fn default() -> Self {
        Self::new(Arc::new(StaticAppearance::default()))
    }
}

impl ThemeEngine {
    pub fn new(appearance: Arc<dyn SystemAppearance>) -> Self {
        Self { appearance }
    }

    pub fn variant(&self, mode: ThemeMode) -> ThemeVariant {
        match mode {
            ThemeMode::Dark => ThemeVariant::Dark,
            ThemeMode::Light => ThemeVariant::Light,
            ThemeMode::Auto if self.appearance.is_dark() => ThemeVariant::Dark,
            ThemeMode::Auto => ThemeVariant::Light,
        }
    }

    /// Palette and stylesheet for a mode at `brightness` percent (50..=150).
    pub fn resolve(&self, mode: ThemeMode, brightness: u8) -> ResolvedTheme {
        let variant = self.variant(mode);
        let colors = palette(variant, brightness);
        let stylesheet = stylesheet(variant, &colors);
        ResolvedTheme {
            variant,
            brightness,
            colors,
            stylesheet,
        }
    }
}

/// The user's theme choice, persisted through the settings store on every change.
pub struct ThemeController<S: SettingsStore> {
    engine: ThemeEngine,
    store: S,
    config: ThemeConfig,
}

impl<S: SettingsStore> ThemeController<S> {
    pub fn load(engine: ThemeEngine, store: S) -> Result<Self, AppError> {
        let mut config = store.load()?.theme;
        config.brightness = clamp_brightness(config.brightness as i32);
        Ok(Self {
            engine,
            store,
            config,
        })
    }

    pub fn config(&self) -> ThemeConfig {
        self.config
    }

    pub fn current(&self) -> ResolvedTheme {
        self.engine.resolve(self.config.mode, self.config.brightness)
    }

    pub fn set_mode(&mut self, mode: ThemeMode) -> Result<ResolvedTheme, AppError> {
        self.config.mode = mode;
        self.persist()
    }

    /// Switch to the opposite of the variant currently shown.
    pub fn toggle(&mut self) -> Result<ResolvedTheme, AppError> {
        let next = self.engine.variant(self.config.mode).toggled();
        self.set_mode(next.into())
    }

    pub fn set_brightness(&mut self, value: i32) -> Result<ResolvedTheme, AppError> {
        self.config.brightness = clamp_brightness(value);
        self.persist()
    }

    pub fn step_brightness(&mut self, up: bool) -> Result<ResolvedTheme, AppError> {
        let step = BRIGHTNESS_STEP as i32;
        let delta = if up { step } else { -step };
        self.set_brightness(self.config.brightness as i32 + delta)
    }

    pub fn reset_brightness(&mut self) -> Result<ResolvedTheme, AppError> {
        self.set_brightness(DEFAULT_BRIGHTNESS as i32)
    }

    fn persist(&mut self) -> Result<ResolvedTheme, AppError> {
        let mut settings = self.store.load()?;
        settings.theme = self.config;
        self.store.save(&settings)?;
        debug!(
            "Theme set to {:?} at {}%",
            self.config.mode, self.config.brightness
        );
        Ok(self.current())
    }
}
