use serde::{Deserialize, Deserializer, Serialize};

pub const MIN_BRIGHTNESS: u8 = 50;
pub const MAX_BRIGHTNESS: u8 = 150;
pub const DEFAULT_BRIGHTNESS: u8 = 100;
pub const BRIGHTNESS_STEP: u8 = 10;

/// Theme the user picked. `Auto` follows the system appearance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
    Auto,
}

/// Concrete palette family after `Auto` has been resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeVariant {
    Dark,
    Light,
}

impl ThemeVariant {
    pub fn toggled(self) -> Self {
        match self {
            ThemeVariant::Dark => ThemeVariant::Light,
            ThemeVariant::Light => ThemeVariant::Dark,
        }
    }
}

impl From<ThemeVariant> for ThemeMode {
    fn from(variant: ThemeVariant) -> Self {
        match variant {
            ThemeVariant::Dark => ThemeMode::Dark,
            ThemeVariant::Light => ThemeMode::Light,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub mode: ThemeMode,
    #[serde(deserialize_with = "deserialize_brightness")]
    pub brightness: u8,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            mode: ThemeMode::default(),
            brightness: DEFAULT_BRIGHTNESS,
        }
    }
}

/// Clamp a requested brightness into the supported 50..=150 range.
pub fn clamp_brightness(value: i32) -> u8 {
    value.clamp(MIN_BRIGHTNESS as i32, MAX_BRIGHTNESS as i32) as u8
}

/// Hand-edited files may hold any integer; clamp instead of rejecting the file.
fn deserialize_brightness<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    Ok(clamp_brightness(value.clamp(i32::MIN as i64, i32::MAX as i64) as i32))
}

/// Named colors of one theme, as `#rrggbb` strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub background: String,
    pub card_background: String,
    pub input_background: String,
    pub text: String,
    pub secondary_text: String,
    pub accent: String,
    pub accent_hover: String,
    pub accent_pressed: String,
    pub border: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedTheme {
    pub variant: ThemeVariant,
    pub brightness: u8,
    pub colors: Palette,
    pub stylesheet: String,
}
