//! CLI definitions using clap derive API

use clap::Parser;
use clap::builder::{Styles, styling::AnsiColor};
use std::path::PathBuf;

use crate::driver::InstallOptions;

/// Self-extracting SDK installer
///
/// Unpacks the bundled SDK into a directory of your choice and rewrites its
/// environment setup scripts for that location.
#[derive(Parser, Debug)]
#[command(
    name = "sdk-installer",
    author,
    version,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Extract SDK",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  sdk-installer\n    \
                  sdk-installer -y -d ~/poky_sdk\n    \
                  sdk-installer -l"
)]
pub struct Cli {
    /// Answer yes to all prompts
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Install SDK to DIR
    #[arg(long, short = 'd', value_name = "DIR")]
    pub dir: Option<String>,

    /// Installer payload (defaults to this executable)
    #[arg(long, value_name = "FILE")]
    pub payload: Option<PathBuf>,

    /// Save relocation scripts
    #[arg(short = 'S', help_heading = "Advanced Debugging Only Options")]
    pub save_scripts: bool,

    /// Do not relocate executables
    #[arg(short = 'R', help_heading = "Advanced Debugging Only Options")]
    pub no_relocate: bool,

    /// Print debugging output (repeat for more)
    #[arg(short = 'D', action = clap::ArgAction::Count, help_heading = "Advanced Debugging Only Options")]
    pub debug: u8,

    /// List files that will be extracted
    #[arg(short = 'l', help_heading = "Advanced Debugging Only Options")]
    pub list_files: bool,

    /// Do not prepare build system
    #[arg(short = 'n', help_heading = "Extensible SDK Only Options")]
    pub no_prepare_buildsystem: bool,

    /// Publish mode (implies -n)
    #[arg(short = 'p', help_heading = "Extensible SDK Only Options")]
    pub publish: bool,
}

impl Cli {
    pub fn install_options(&self) -> InstallOptions {
        InstallOptions {
            yes: self.yes,
            dir: self.dir.clone(),
            save_scripts: self.save_scripts,
            relocate: !self.no_relocate,
            list_only: self.list_files,
            prepare_buildsystem: !self.no_prepare_buildsystem && !self.publish,
            publish: self.publish,
            show_progress: true,
        }
    }

    /// Log filter directive for the `-D` count
    pub fn log_level(&self) -> &'static str {
        match self.debug {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
