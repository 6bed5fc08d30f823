//! Pre- and post-install hook scripts
//!
//! The payload ships two opaque shell fragments. Before running one, the
//! installer materializes it as a temporary `/bin/sh` script whose header
//! assigns the resolved install values; the fragment follows verbatim.
//! Shell hooks are not run on Windows.

use std::io::Write;
use std::path::Path;

use crate::command::run_command;
use crate::config::{POST_INSTALL_FRAGMENT, PRE_INSTALL_FRAGMENT};
use crate::error::{InstallerError, Result};
use crate::payload::PayloadContainer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    PreInstall,
    PostInstall,
}

impl HookKind {
    pub fn name(self) -> &'static str {
        match self {
            HookKind::PreInstall => "pre-install",
            HookKind::PostInstall => "post-install",
        }
    }
}

/// Variables assigned at the top of a generated hook script, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookContext {
    vars: Vec<(String, String)>,
}

impl HookContext {
    /// Variables every hook receives
    pub fn new(default_install_dir: &str) -> Self {
        Self::default()
            .with("DEFAULT_INSTALL_DIR", default_install_dir)
            .with("SUDO_EXEC", "")
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((name.to_string(), value.into()));
        self
    }

    pub fn with_flag(self, name: &str, value: bool) -> Self {
        self.with(name, if value { "1" } else { "0" })
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Full script text: shebang, assignments, then `body`
    pub fn render(&self, body: &str) -> String {
        let mut script = String::from("#!/bin/sh\n");
        for (name, value) in &self.vars {
            script.push_str(&format!("{name}=\"{value}\"\n"));
        }
        script.push_str(body);
        if !body.is_empty() && !body.ends_with('\n') {
            script.push('\n');
        }
        script
    }
}

/// Runs install hooks on behalf of the driver
pub trait HookRunner {
    fn run_hook(&mut self, kind: HookKind, context: &HookContext) -> Result<()>;

    /// Run an already extracted setup script with `args`
    fn run_setup_script(&mut self, script: &Path, args: &[&str]) -> Result<()>;
}

/// Runs hooks with `/bin/sh`
#[derive(Debug, Clone, Default)]
pub struct ShellHookRunner {
    pre_install: String,
    post_install: String,
}

impl ShellHookRunner {
    pub fn new(pre_install: impl Into<String>, post_install: impl Into<String>) -> Self {
        Self {
            pre_install: pre_install.into(),
            post_install: post_install.into(),
        }
    }

    /// Load both fragments from the payload; a missing fragment is empty
    pub fn from_container(container: &mut PayloadContainer) -> Result<Self> {
        Ok(Self::new(
            container.read_text_or_empty(PRE_INSTALL_FRAGMENT)?,
            container.read_text_or_empty(POST_INSTALL_FRAGMENT)?,
        ))
    }

    fn fragment(&self, kind: HookKind) -> &str {
        match kind {
            HookKind::PreInstall => &self.pre_install,
            HookKind::PostInstall => &self.post_install,
        }
    }
}

fn hook_failed(hook: &str, err: InstallerError) -> InstallerError {
    match err {
        InstallerError::CommandFailed { status, .. } => InstallerError::HookFailed {
            hook: hook.to_string(),
            status,
        },
        other => other,
    }
}

impl HookRunner for ShellHookRunner {
    fn run_hook(&mut self, kind: HookKind, context: &HookContext) -> Result<()> {
        if cfg!(windows) {
            return Ok(());
        }

        let text = context.render(self.fragment(kind));
        let mut script = tempfile::Builder::new()
            .prefix("sdk-installer-hook.")
            .suffix(".sh")
            .tempfile_in(crate::temp::temp_dir_base())?;
        let path = script.path().to_path_buf();
        script
            .write_all(text.as_bytes())
            .and_then(|()| script.flush())
            .map_err(|e| InstallerError::write_failed(&path, &e))?;

        tracing::debug!("Running {} script:", kind.name());
        for line in text.lines() {
            tracing::debug!("> {line}");
        }

        // `script` is dropped, and the file removed, on every path out of here
        run_command("/bin/sh", &[&path.to_string_lossy()]).map_err(|e| hook_failed(kind.name(), e))
    }

    fn run_setup_script(&mut self, script: &Path, args: &[&str]) -> Result<()> {
        if cfg!(windows) {
            return Ok(());
        }
        let script_arg = script.to_string_lossy();
        let mut argv = vec![script_arg.as_ref()];
        argv.extend_from_slice(args);
        let name = script
            .file_name()
            .map_or_else(|| script_arg.to_string(), |n| n.to_string_lossy().into_owned());
        run_command("/bin/sh", &argv).map_err(|e| hook_failed(&name, e))
    }
}
