use crate::models::classify_types::{OutputActivation, TensorLayout};
use crate::models::theme_types::ThemeMode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "photo-sorter", version)]
#[command(about = "Sort folders of photos into per-class folders with an image classifier", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (default: <config dir>/photo-sorter/settings.json)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify every image under the input folders into per-class folders
    Classify(ClassifyArgs),

    /// Show or change the color theme
    Theme {
        #[command(subcommand)]
        action: ThemeAction,
    },

    /// Show or change stored preferences
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Args, Debug, Default)]
pub struct ClassifyArgs {
    /// Model file (default: last used)
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Label file, one class name per line (default: last used)
    #[arg(short, long)]
    pub labels: Option<PathBuf>,

    /// Output folder (default: last used)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Input folders (default: last used)
    pub inputs: Vec<PathBuf>,

    /// Images per batch (default: from settings)
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Worker threads (default: available cores, at most 8)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Input tensor layout
    #[arg(long, value_enum, default_value_t = LayoutArg::Nhwc)]
    pub layout: LayoutArg,

    /// Treat model output as logits and apply softmax
    #[arg(long)]
    pub logits: bool,

    /// Try GPU execution providers first
    #[arg(long)]
    pub gpu: bool,

    /// Write the results as CSV
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

impl ClassifyArgs {
    pub fn activation(&self) -> OutputActivation {
        if self.logits {
            OutputActivation::Logits
        } else {
            OutputActivation::Probabilities
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    #[default]
    Nhwc,
    Nchw,
}

impl From<LayoutArg> for TensorLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Nhwc => TensorLayout::Nhwc,
            LayoutArg::Nchw => TensorLayout::Nchw,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ThemeAction {
    /// Print the resolved palette
    Show {
        /// Also print the full stylesheet
        #[arg(long)]
        stylesheet: bool,
    },
    /// Set dark, light or auto
    Mode { mode: ThemeMode },
    /// Set brightness percent (clamped to 50..=150)
    Brightness {
        #[arg(allow_hyphen_values = true)]
        value: i32,
    },
    /// Lower brightness by 10
    Dim,
    /// Raise brightness by 10
    Bright,
    /// Back to 100%
    Reset,
    /// Switch between dark and light
    Toggle,
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print all settings as JSON
    Show,
    /// Set the default batch size
    BatchSize { size: usize },
    /// List recently used paths
    Recent,
    /// Forget recently used paths
    ClearRecent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn classify_parses_inputs_and_flags() {
        let cli = Cli::try_parse_from([
            "photo-sorter",
            "classify",
            "-m",
            "model.onnx",
            "-l",
            "labels.txt",
            "-o",
            "sorted",
            "a",
            "b",
            "--batch-size",
            "8",
            "--logits",
        ])
        .unwrap();

        match cli.command {
            Commands::Classify(args) => {
                assert_eq!(args.inputs, vec![PathBuf::from("a"), PathBuf::from("b")]);
                assert_eq!(args.batch_size, Some(8));
                assert_eq!(args.activation(), OutputActivation::Logits);
                assert_eq!(TensorLayout::from(args.layout), TensorLayout::Nhwc);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn theme_brightness_accepts_negative_values() {
        let cli = Cli::try_parse_from(["photo-sorter", "theme", "brightness", "-20"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Theme {
                action: ThemeAction::Brightness { value: -20 }
            }
        ));
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["photo-sorter", "-v", "-q", "settings", "show"]).is_err());
    }
}
