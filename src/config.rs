//! Installer manifest shipped inside the payload container
//!
//! The manifest carries the values fixed when the SDK was built: banner
//! text, the architecture and kernel the SDK targets, the default install
//! path (which is also the path baked into the generated scripts) and the
//! name of the inner archive member.

use serde::Deserialize;

use crate::error::Result;

/// Name of the manifest member inside the payload container
pub const MANIFEST_NAME: &str = "installer.yaml";

/// Name of the pre-install hook fragment inside the payload container
pub const PRE_INSTALL_FRAGMENT: &str = "pre_install_command";

/// Name of the post-install hook fragment inside the payload container
pub const POST_INSTALL_FRAGMENT: &str = "post_install_command";

/// Extensible SDK flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtSdkType {
    #[default]
    Full,
    Minimal,
}

/// Build-time description of the bundled SDK
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadManifest {
    pub title: String,
    pub version: String,
    /// Host architecture the SDK binaries were built for
    pub arch: String,
    /// Default install location; every generated script references it
    pub sdk_path: String,
    #[serde(default)]
    pub ext_sdk_path: Option<String>,
    #[serde(default)]
    pub extensible: bool,
    #[serde(default)]
    pub ext_type: ExtSdkType,
    /// Inner archive member name
    pub tar_name: String,
    #[serde(default)]
    pub gcc_version: String,
    pub oldest_kernel: String,
    /// Suffix of the canonical `environment-setup-*` script
    pub target_sys: String,
}

impl PayloadManifest {
    /// Parse a manifest from YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Default destination, and the placeholder rewritten by relocation
    pub fn default_install_dir(&self) -> &str {
        match (&self.ext_sdk_path, self.extensible) {
            (Some(ext), true) => ext,
            _ => &self.sdk_path,
        }
    }

    /// Name fragments skipped during extraction
    pub fn extract_exclusions(&self) -> Vec<String> {
        let mut exclude = Vec::new();
        if self.extensible {
            exclude.push("ext-sdk-prepare.py".to_string());
            if self.ext_type == ExtSdkType::Minimal {
                exclude.push("sstate-cache".to_string());
            }
        }
        exclude
    }

    /// File whose presence marks an existing install of this SDK
    pub fn canonical_env_script_name(&self) -> String {
        format!("environment-setup-{}", self.target_sys)
    }

    /// Banner line printed before installing
    pub fn banner(&self) -> String {
        format!("{} installer version {}", self.title, self.version)
    }
}
