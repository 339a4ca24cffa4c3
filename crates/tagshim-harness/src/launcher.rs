//! Run a program with the shim preloaded.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use tagshim_core::config::{ENV_REALLOC_POLICY, ENV_SMALL_THRESHOLD, ENV_TAG, ENV_TRACE};
use tagshim_core::{ReallocPolicy, TagMask};

use crate::error::HarnessError;

pub const ENV_LD_PRELOAD: &str = "LD_PRELOAD";

/// A program invocation with the shim injected through `LD_PRELOAD`.
#[derive(Debug, Clone)]
pub struct PreloadLaunch {
    library: PathBuf,
    program: OsString,
    args: Vec<OsString>,
    tag: Option<TagMask>,
    small_object_threshold: Option<usize>,
    trace: bool,
    realloc_policy: Option<ReallocPolicy>,
}

impl PreloadLaunch {
    /// `argv[0]` and the rest; fails if `argv` is empty.
    pub fn new<I, S>(library: impl Into<PathBuf>, argv: I) -> Result<Self, HarnessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let program = argv.next().ok_or(HarnessError::EmptyCommand)?;
        Ok(Self {
            library: library.into(),
            program,
            args: argv.collect(),
            tag: None,
            small_object_threshold: None,
            trace: false,
            realloc_policy: None,
        })
    }

    #[must_use]
    pub fn tag(mut self, tag: TagMask) -> Self {
        self.tag = Some(tag);
        self
    }

    #[must_use]
    pub fn small_object_threshold(mut self, threshold: usize) -> Self {
        self.small_object_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    #[must_use]
    pub fn realloc_policy(mut self, policy: ReallocPolicy) -> Self {
        self.realloc_policy = Some(policy);
        self
    }

    #[must_use]
    pub fn library(&self) -> &Path {
        &self.library
    }

    /// Fail early if the library does not exist.
    pub fn check_library(&self) -> Result<(), HarnessError> {
        if self.library.is_file() {
            Ok(())
        } else {
            Err(HarnessError::MissingLibrary {
                path: self.library.clone(),
            })
        }
    }

    /// `LD_PRELOAD` value: the shim first, then whatever was already preloaded.
    #[must_use]
    pub fn preload_value(&self, inherited: Option<&OsStr>) -> OsString {
        let mut value = self.library.clone().into_os_string();
        if let Some(rest) = inherited.filter(|rest| !rest.is_empty()) {
            value.push(":");
            value.push(rest);
        }
        value
    }

    /// Shim variables to set, in a stable order. Unset options are left to the
    /// shim's defaults.
    #[must_use]
    pub fn shim_env(&self) -> Vec<(&'static str, String)> {
        let mut env = Vec::new();
        if let Some(tag) = self.tag {
            env.push((ENV_TAG, format!("{:#06x}", tag.tag())));
        }
        if let Some(threshold) = self.small_object_threshold {
            env.push((ENV_SMALL_THRESHOLD, threshold.to_string()));
        }
        if self.trace {
            env.push((ENV_TRACE, "1".to_string()));
        }
        if let Some(policy) = self.realloc_policy {
            env.push((ENV_REALLOC_POLICY, policy.as_str().to_string()));
        }
        env
    }

    /// Build the command. `inherited_preload` is the caller's `LD_PRELOAD`.
    #[must_use]
    pub fn command(&self, inherited_preload: Option<&OsStr>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env(ENV_LD_PRELOAD, self.preload_value(inherited_preload));
        for (key, value) in self.shim_env() {
            cmd.env(key, value);
        }
        cmd
    }
}
