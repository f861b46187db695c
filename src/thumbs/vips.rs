//! Derivation through libvips' `vipsthumbnail` command.
//!
//! ```text
//! vipsthumbnail <source> --rotate --size 1000 --interpolator bicubic \
//!     --output <target>[Q=97,no_subsample,strip]
//! vipsthumbnail <source> --rotate --size 200 --crop --interpolator bicubic \
//!     --output <target>[Q=97,no_subsample,strip]
//! ```
//!
//! The output format follows the target's extension, so targets must end in
//! `.jpg`. A non-zero exit is a failure; its stderr is kept in the error.

use super::deriver::{DeriveError, DeriveParams, Deriver};
use crate::config::DeriveConfig;
use std::ffi::OsString;
use std::process::Command;

#[derive(Debug, Clone)]
pub struct VipsDeriver {
    program: String,
    interpolator: String,
}

impl VipsDeriver {
    pub fn new(config: &DeriveConfig) -> Self {
        Self {
            program: config.program.clone(),
            interpolator: config.interpolator.clone(),
        }
    }

    pub fn arguments(&self, params: &DeriveParams) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![params.source.clone().into_os_string()];
        if params.rotate {
            args.push("--rotate".into());
        }
        args.push("--size".into());
        args.push(params.size.to_string().into());
        if params.crop {
            args.push("--crop".into());
        }
        args.push("--interpolator".into());
        args.push(self.interpolator.clone().into());
        args.push("--output".into());
        let mut output = params.output.clone().into_os_string();
        output.push(format!(
            "[Q={},no_subsample,strip]",
            params.quality.value()
        ));
        args.push(output);
        args
    }
}

impl Deriver for VipsDeriver {
    fn derive(&self, params: &DeriveParams) -> Result<(), DeriveError> {
        let output = Command::new(&self.program)
            .args(self.arguments(params))
            .output()
            .map_err(|source| DeriveError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(DeriveError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
