//! Common test utilities for SDK installer integration tests

use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// Path baked into the test SDK's generated scripts
pub const SDK_PATH: &str = "/opt/test-sdk/1.0";

pub const TARGET_SYS: &str = "core2-64-test-linux";

pub fn env_script_name() -> String {
    format!("environment-setup-{TARGET_SYS}")
}

/// Machine name as reported by the host, so the payload always matches
pub fn host_machine() -> String {
    let output = std::process::Command::new("uname")
        .arg("-m")
        .output()
        .expect("Failed to run uname -m");
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Builds an installer payload: manifest, SDK tar and hook fragments in a zip
pub struct PayloadBuilder {
    arch: String,
    files: Vec<(String, Vec<u8>)>,
    symlinks: Vec<(String, String)>,
    pre_install: Option<String>,
    post_install: Option<String>,
}

#[allow(dead_code)]
impl PayloadBuilder {
    /// A minimal SDK: canonical environment script, helpers and one tool
    pub fn standard() -> Self {
        Self {
            arch: host_machine(),
            files: Vec::new(),
            symlinks: Vec::new(),
            pre_install: None,
            post_install: None,
        }
        .file(
            &env_script_name(),
            &format!(
                "export SDKTARGETSYSROOT={SDK_PATH}/sysroots/{TARGET_SYS}\n\
                 export PATH={SDK_PATH}/sysroots/x86_64-testsdk-linux/usr/bin:$PATH\n\
                 export OECORE_NATIVE_SYSROOT=\"{SDK_PATH}/sysroots/x86_64-testsdk-linux\"\n"
            ),
        )
        .file("relocate_sdk.py", "#!/usr/bin/env python3\n")
        .file("relocate_sdk.sh", "#!/bin/sh\n")
        .file(
            "sysroots/x86_64-testsdk-linux/usr/bin/testcc",
            "#!/bin/sh\necho testcc\n",
        )
        .file(&format!("version-{TARGET_SYS}"), "Distro: test\n")
    }

    pub fn arch(mut self, arch: &str) -> Self {
        self.arch = arch.to_string();
        self
    }

    pub fn file(mut self, name: &str, contents: &str) -> Self {
        self.files
            .push((name.to_string(), contents.as_bytes().to_vec()));
        self
    }

    pub fn symlink(mut self, name: &str, target: &str) -> Self {
        self.symlinks.push((name.to_string(), target.to_string()));
        self
    }

    pub fn pre_install(mut self, body: &str) -> Self {
        self.pre_install = Some(body.to_string());
        self
    }

    pub fn post_install(mut self, body: &str) -> Self {
        self.post_install = Some(body.to_string());
        self
    }

    fn manifest(&self) -> String {
        format!(
            "title: Test SDK\n\
             version: '1.0'\n\
             arch: {}\n\
             sdk_path: {SDK_PATH}\n\
             tar_name: sdk.tar.gz\n\
             oldest_kernel: '2.6.0'\n\
             target_sys: {TARGET_SYS}\n",
            self.arch
        )
    }

    fn sdk_tar(&self) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in &self.files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, name, data.as_slice())
                .expect("Failed to append tar entry");
        }
        for (name, target) in &self.symlinks {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            header.set_mode(0o777);
            builder
                .append_link(&mut header, name, target)
                .expect("Failed to append tar symlink");
        }
        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .expect("Failed to finish tar")
    }

    /// Write the payload into `dir` and return its path
    pub fn write(&self, dir: &Path) -> PathBuf {
        let path = dir.join("sdk-installer-payload.zip");
        let file = std::fs::File::create(&path).expect("Failed to create payload");
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        let mut members = vec![
            ("installer.yaml", self.manifest().into_bytes()),
            ("sdk.tar.gz", self.sdk_tar()),
        ];
        if let Some(body) = &self.pre_install {
            members.push(("pre_install_command", body.clone().into_bytes()));
        }
        if let Some(body) = &self.post_install {
            members.push(("post_install_command", body.clone().into_bytes()));
        }
        for (name, data) in members {
            zip.start_file(name, options)
                .expect("Failed to start zip member");
            zip.write_all(&data).expect("Failed to write zip member");
        }
        zip.finish().expect("Failed to finish payload");
        path
    }
}

/// Scratch space holding a payload and an install destination
pub struct TestInstall {
    #[allow(dead_code)]
    pub temp: TempDir,
    pub root: PathBuf,
    pub payload: PathBuf,
}

#[allow(dead_code)]
impl TestInstall {
    pub fn new(builder: &PayloadBuilder) -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = dunce::canonicalize(temp.path()).expect("Failed to canonicalize temp dir");
        let payload = builder.write(&root);
        Self {
            temp,
            root,
            payload,
        }
    }

    pub fn dest(&self) -> PathBuf {
        self.root.join("sdk")
    }

    /// Installer command reading this payload, with the environment already cleaned
    pub fn cmd(&self) -> Command {
        let mut cmd = sdk_installer_cmd();
        cmd.arg("--payload").arg(&self.payload).env("ENVCLEANED", "1");
        cmd
    }

    /// Relative paths of every file and link under the destination, sorted
    pub fn installed_files(&self) -> Vec<String> {
        let dest = self.dest();
        let mut files: Vec<String> = walkdir::WalkDir::new(&dest)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| !entry.file_type().is_dir())
            .map(|entry| {
                entry
                    .path()
                    .strip_prefix(&dest)
                    .expect("Entry outside destination")
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        files.sort();
        files
    }
}

// Temporary fix for deprecated cargo_bin - will be updated when build-dir issues are resolved
#[allow(deprecated)]
pub fn sdk_installer_cmd() -> Command {
    Command::cargo_bin("sdk-installer").expect("Failed to find sdk-installer binary")
}
