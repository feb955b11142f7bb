//! Conversion of rendered DOCX letters into PDF.
//!
//! The work is delegated to an external office suite. Which one is decided
//! once at startup from [`ConverterConfig`]; the rest of the pipeline only
//! sees the [`DocumentConverter`] trait.
//!
//! Every conversion runs in its own scratch directory that is removed when
//! the call returns, whether it succeeded, the tool failed, or the output
//! never showed up.

mod automation;
mod headless;
mod native;
mod readiness;

pub use automation::AutomationSession;
pub use headless::HeadlessOfficeConverter;
pub use native::NativeOfficeConverter;
pub use readiness::wait_for_output;

use crate::config::{ConverterConfig, ConverterKind};
use log::debug;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const STDERR_TAIL_CHARS: usize = 400;

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("converter '{program}' failed: {detail}")]
    ProcessFailed { program: String, detail: String },
    #[error("converted file {} did not appear after {waited:?}", path.display())]
    Timeout { path: PathBuf, waited: Duration },
    #[error("conversion scratch space error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns DOCX bytes into PDF bytes.
///
/// Implementations block: call them from a blocking thread, never directly
/// on the async runtime.
pub trait DocumentConverter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Acquires whatever per-thread state the converter needs for a whole
    /// unit of work. The state is released when the returned guard drops.
    fn begin_session(&self) -> Result<ConverterSession, ConversionError> {
        Ok(ConverterSession::default())
    }

    /// Converts `source`. `file_stem` names the scratch files, which some
    /// tools echo into document metadata.
    fn convert(&self, source: &[u8], file_stem: &str) -> Result<Vec<u8>, ConversionError>;
}

/// Scoped converter state, held for the duration of a unit of work.
#[derive(Default)]
pub struct ConverterSession {
    automation: Option<AutomationSession>,
}

impl ConverterSession {
    pub fn automation(session: AutomationSession) -> Self {
        Self {
            automation: Some(session),
        }
    }

    pub fn is_active(&self) -> bool {
        self.automation.is_some()
    }
}

/// Builds the converter selected by configuration.
pub fn from_config(config: &ConverterConfig) -> Arc<dyn DocumentConverter> {
    match config.kind {
        ConverterKind::Headless => Arc::new(HeadlessOfficeConverter::new(
            config.program.clone(),
            config.work_dir.clone(),
            config.readiness,
        )),
        ConverterKind::Native => Arc::new(NativeOfficeConverter::new(
            config.program.clone(),
            config.teardown.clone(),
            config.work_dir.clone(),
            config.readiness,
        )),
    }
}

/// Creates the per-conversion scratch directory.
fn scratch_dir(work_dir: Option<&Path>) -> std::io::Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("offer-letter-");
    match work_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            builder.tempdir_in(dir)
        }
        None => builder.tempdir(),
    }
}

/// Runs an external tool to completion and maps failure to
/// [`ConversionError::ProcessFailed`].
fn run_tool<I, S>(program: &str, args: I) -> Result<(), ConversionError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|err| ConversionError::ProcessFailed {
            program: program.to_string(),
            detail: format!("could not start: {err}"),
        })?;

    if output.status.success() {
        debug!("converter '{}' exited cleanly", program);
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    let tail = match stderr.char_indices().rev().nth(STDERR_TAIL_CHARS) {
        Some((cut, _)) => &stderr[cut..],
        None => stderr,
    };
    Err(ConversionError::ProcessFailed {
        program: program.to_string(),
        detail: if tail.is_empty() {
            format!("exited with {}", output.status)
        } else {
            format!("exited with {}: {}", output.status, tail)
        },
    })
}
