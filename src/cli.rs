//! Command-line surface of the kiosk client.
//!
//! `kiosk` is the interactive mode an attendance desk runs all day; `once`
//! runs a single unattended attempt from an image file, handy for scripted
//! checks against a server.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::models::DeviceClass;

/// scanmark: face-scan attendance kiosk.
#[derive(Debug, Parser)]
#[command(name = "scanmark", version, after_long_help = KIOSK_HELP)]
pub struct Cli {
    /// Attendance server base URL. Overrides the settings file.
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Settings file. Defaults to `settings.json` in the data directory.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Directory for settings and the attempt journal.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

const KIOSK_HELP: &str = r#"Kiosk commands (type and press enter):
  s, scan      capture a frame and look the face up
  y, confirm   mark attendance now instead of waiting for the countdown
  n, cancel    stop the countdown; start a new scan to try again
  d, dismiss   hide the current notice
  r, retry     re-open the camera
  q, quit      leave the kiosk"#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the interactive attendance kiosk.
    Kiosk(KioskArgs),

    /// Run one unattended attempt and exit. Attendance is confirmed
    /// automatically when the countdown runs out.
    Once {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Image file used as the camera frame.
        #[arg(long)]
        image: PathBuf,

        /// Print the attempt report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List recent attempts from the local journal.
    History {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Print the effective settings.
    Config {
        /// Default confirmation delay to store.
        #[arg(long)]
        delay: Option<u32>,

        #[arg(long, value_enum)]
        device: Option<DeviceArg>,

        /// Write `--server` and the options above to the settings file.
        #[arg(long)]
        save: bool,
    },
}

#[derive(Debug, Args)]
pub struct SelectionArgs {
    /// Field (department) to scan for.
    #[arg(long)]
    pub field: String,

    /// Course within the field.
    #[arg(long)]
    pub course: String,

    /// Confirmation delay in seconds. Zero or a non-number falls back to
    /// the device default.
    #[arg(long)]
    pub delay: Option<String>,

    /// Device class used for the default delay.
    #[arg(long, value_enum)]
    pub device: Option<DeviceArg>,

    /// Derive the device class from a browser user-agent string.
    #[arg(long, conflicts_with = "device")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Args)]
pub struct KioskArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Use an image file instead of a camera device.
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Camera device index. Overrides the settings file.
    #[arg(long)]
    pub camera_index: Option<u32>,

    /// Count down and scan on start, as if the operator pressed `scan`.
    #[arg(long)]
    pub auto_scan: bool,

    /// Print kiosk events as JSON lines.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceArg {
    Desktop,
    Mobile,
}

impl From<DeviceArg> for DeviceClass {
    fn from(value: DeviceArg) -> Self {
        match value {
            DeviceArg::Desktop => DeviceClass::Desktop,
            DeviceArg::Mobile => DeviceClass::Mobile,
        }
    }
}

impl SelectionArgs {
    /// Device class from the flags, or `fallback` when none was given.
    pub fn device_class(&self, fallback: DeviceClass) -> DeviceClass {
        if let Some(device) = self.device {
            return device.into();
        }
        self.user_agent
            .as_deref()
            .map(DeviceClass::from_user_agent)
            .unwrap_or(fallback)
    }
}
