//! Install session driver
//!
//! Runs one install from start to finish:
//!
//! ```text
//! Start -> CompatChecked -> DestinationChosen -> Confirmed -> Extracted -> Relocated -> Done
//!                                   |                |
//!                                   v                +--(list only)--> Done
//!                                Aborted
//! ```
//!
//! Any error moves the driver to `Failed`; declining the confirmation moves
//! it to `Aborted`. Nothing is written to the destination before
//! `Confirmed`.

use std::io;
use std::path::{Path, PathBuf};

use console::style;

use crate::compat::{HostProbe, check_host};
use crate::config::{MANIFEST_NAME, PayloadManifest};
use crate::error::{InstallerError, Result};
use crate::extract;
use crate::hooks::{HookContext, HookKind, HookRunner};
use crate::payload::PayloadContainer;
use crate::progress::ExtractProgress;
use crate::prompt::Prompter;
use crate::relocate::{relocate_environment_scripts, relocate_file, remove_relocation_helpers};
use crate::session::{InstallSession, resolve_destination};

/// Setup script run once after relocation, if the SDK ships one
pub const POST_RELOCATE_SCRIPT: &str = "post-relocate-setup.sh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Start,
    CompatChecked,
    DestinationChosen,
    Confirmed,
    Extracted,
    Relocated,
    Done,
    Aborted,
    Failed,
}

/// User choices for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Answer yes to every prompt
    pub yes: bool,
    pub dir: Option<String>,
    pub save_scripts: bool,
    pub relocate: bool,
    pub list_only: bool,
    pub prepare_buildsystem: bool,
    pub publish: bool,
    /// Draw the extraction spinner
    pub show_progress: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            yes: false,
            dir: None,
            save_scripts: false,
            relocate: true,
            list_only: false,
            prepare_buildsystem: true,
            publish: false,
            show_progress: true,
        }
    }
}

/// What a successful run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed {
        destination: PathBuf,
        env_setup_scripts: Vec<PathBuf>,
    },
    Listed {
        entries: usize,
    },
}

pub struct Installer<'a> {
    container: PayloadContainer,
    manifest: PayloadManifest,
    options: InstallOptions,
    probe: &'a dyn HostProbe,
    prompter: &'a mut dyn Prompter,
    hooks: &'a mut dyn HookRunner,
    state: InstallState,
}

impl<'a> Installer<'a> {
    /// Read the manifest from `container` and prepare a run
    pub fn new(
        mut container: PayloadContainer,
        options: InstallOptions,
        probe: &'a dyn HostProbe,
        prompter: &'a mut dyn Prompter,
        hooks: &'a mut dyn HookRunner,
    ) -> Result<Self> {
        let manifest = PayloadManifest::from_yaml(&container.read_text(MANIFEST_NAME)?)?;
        Ok(Self {
            container,
            manifest,
            options,
            probe,
            prompter,
            hooks,
            state: InstallState::Start,
        })
    }

    #[cfg(test)]
    pub fn state(&self) -> InstallState {
        self.state
    }

    pub fn manifest(&self) -> &PayloadManifest {
        &self.manifest
    }

    fn transition(&mut self, next: InstallState) {
        tracing::debug!("Install state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run the install to completion
    pub fn run(&mut self) -> Result<InstallOutcome> {
        let result = self.run_steps();
        match &result {
            Ok(_) => self.transition(InstallState::Done),
            Err(InstallerError::Aborted) => self.transition(InstallState::Aborted),
            Err(_) => self.transition(InstallState::Failed),
        }
        result
    }

    fn run_steps(&mut self) -> Result<InstallOutcome> {
        check_host(&self.manifest, self.probe)?;
        self.transition(InstallState::CompatChecked);

        print_banner(&self.manifest.banner());

        let default_dir = self.manifest.default_install_dir().to_string();
        self.hooks
            .run_hook(HookKind::PreInstall, &HookContext::new(&default_dir))?;

        let mut session = self.choose_destination(&default_dir)?;
        self.transition(InstallState::DestinationChosen);

        self.confirm(&session)?;
        self.transition(InstallState::Confirmed);

        if self.options.list_only {
            let mut archive = self.container.open_sdk_archive(&self.manifest.tar_name)?;
            let entries = extract::list(&mut archive, &session, &mut io::stdout().lock())?;
            return Ok(InstallOutcome::Listed { entries });
        }

        println!("Extracting SDK");
        self.extract(&mut session)?;
        self.transition(InstallState::Extracted);

        println!("Setting it up...");
        let destination = session.destination_str();
        let relocated =
            relocate_environment_scripts(session.destination(), &default_dir, &destination)?;
        let env_setup_script = relocated.env_setup_script().map_or_else(
            || {
                session
                    .destination()
                    .join(self.manifest.canonical_env_script_name())
            },
            Path::to_path_buf,
        );
        self.transition(InstallState::Relocated);

        let context = HookContext::new(&default_dir)
            .with("env_setup_script", env_setup_script.to_string_lossy())
            .with("target_sdk_dir", destination.as_str())
            .with_flag("relocate", session.relocate())
            .with_flag("savescripts", session.save_scripts())
            .with(
                "prepare_buildsystem",
                if self.options.prepare_buildsystem { "yes" } else { "no" },
            )
            .with_flag("publish", self.options.publish);
        self.hooks.run_hook(HookKind::PostInstall, &context)?;

        if !session.save_scripts() {
            if let Some(dir) = env_setup_script.parent() {
                remove_relocation_helpers(dir);
            }
        }

        self.post_relocate_setup(&session, &default_dir)?;

        print_success(&relocated.scripts);
        Ok(InstallOutcome::Installed {
            destination: session.destination().to_path_buf(),
            env_setup_scripts: relocated.scripts,
        })
    }

    fn choose_destination(&mut self, default_dir: &str) -> Result<InstallSession> {
        let input = match (&self.options.dir, self.options.yes) {
            (Some(dir), _) => dir.clone(),
            (None, true) => default_dir.to_string(),
            (None, false) => self.prompter.destination(default_dir)?,
        };
        let destination = resolve_destination(&input)?;
        InstallSession::new(
            destination,
            self.manifest.extract_exclusions(),
            self.options.relocate,
            self.options.save_scripts,
        )
    }

    fn confirm(&mut self, session: &InstallSession) -> Result<()> {
        let destination = session.destination();
        let existing = destination
            .join(self.manifest.canonical_env_script_name())
            .exists();

        let proceed = if existing {
            println!(
                "The directory \"{}\" already contains a SDK for this architecture.",
                destination.display()
            );
            self.options.yes
                || self.prompter.confirm(
                    "If you continue, existing files will be overwritten! Proceed?",
                    false,
                )?
        } else {
            self.options.yes
                || self.prompter.confirm(
                    &format!(
                        "You are about to install the SDK to \"{}\". Proceed?",
                        destination.display()
                    ),
                    true,
                )?
        };

        if proceed {
            Ok(())
        } else {
            Err(InstallerError::Aborted)
        }
    }

    fn extract(&mut self, session: &mut InstallSession) -> Result<u64> {
        let progress = if self.options.show_progress {
            ExtractProgress::new()
        } else {
            ExtractProgress::hidden()
        };
        tracing::info!("Making directory '{}'", session.destination().display());

        let result = self
            .container
            .open_sdk_archive(&self.manifest.tar_name)
            .and_then(|mut archive| {
                extract::extract(&mut archive, session, |ticks, bytes| {
                    progress.tick(ticks, bytes);
                })
            });
        match &result {
            Ok(bytes) => {
                progress.finish();
                tracing::info!(
                    "Extracted {bytes} bytes ({} checkpoints)",
                    session.checkpoints()
                );
            }
            Err(_) => progress.abandon(),
        }
        println!();
        result
    }

    fn post_relocate_setup(&mut self, session: &InstallSession, default_dir: &str) -> Result<()> {
        let script = session.destination().join(POST_RELOCATE_SCRIPT);
        if !script.exists() {
            return Ok(());
        }
        let destination = session.destination_str();
        relocate_file(&script, default_dir, &destination)?;
        self.hooks
            .run_setup_script(&script, &[destination.as_str(), default_dir])?;
        if !session.save_scripts() {
            tracing::info!("Deleting '{}'", script.display());
            std::fs::remove_file(&script).map_err(|e| InstallerError::write_failed(&script, &e))?;
        }
        Ok(())
    }
}

fn print_banner(title: &str) {
    println!("{}", style(title).bold());
    println!("{}", "=".repeat(title.chars().count()));
}

fn print_success(scripts: &[PathBuf]) {
    println!("SDK has been successfully set up and is ready to be used.");
    println!(
        "Each time you wish to use the SDK in a new shell session, you need to source the environment setup script e.g."
    );
    let source = if cfg!(windows) { "call" } else { "." };
    for script in scripts {
        println!(" $ {source} {}", script.display());
    }
}
