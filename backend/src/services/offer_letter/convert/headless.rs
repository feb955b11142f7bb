use super::{run_tool, scratch_dir, wait_for_output, ConversionError, DocumentConverter};
use crate::config::ReadinessPolicy;
use log::info;
use std::fs;
use std::path::PathBuf;

/// Converts through a headless office suite such as LibreOffice:
/// `<program> --headless --convert-to pdf <input> --outdir <dir>`.
///
/// Each call gets its own user profile inside the scratch directory, so
/// concurrent conversions do not fight over the suite's profile lock.
#[derive(Debug, Clone)]
pub struct HeadlessOfficeConverter {
    program: String,
    work_dir: Option<PathBuf>,
    readiness: ReadinessPolicy,
}

impl HeadlessOfficeConverter {
    pub fn new(program: String, work_dir: Option<PathBuf>, readiness: ReadinessPolicy) -> Self {
        Self {
            program,
            work_dir,
            readiness,
        }
    }
}

impl DocumentConverter for HeadlessOfficeConverter {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn convert(&self, source: &[u8], file_stem: &str) -> Result<Vec<u8>, ConversionError> {
        let scratch = scratch_dir(self.work_dir.as_deref())?;
        let input = scratch.path().join(format!("{file_stem}.docx"));
        let output = scratch.path().join(format!("{file_stem}.pdf"));
        let profile = scratch.path().join("profile");
        fs::write(&input, source)?;

        info!("converting {} with {}", input.display(), self.program);
        run_tool(
            &self.program,
            [
                format!("-env:UserInstallation=file://{}", profile.display()),
                "--headless".to_string(),
                "--convert-to".to_string(),
                "pdf".to_string(),
                input.display().to_string(),
                "--outdir".to_string(),
                scratch.path().display().to_string(),
            ],
        )?;

        wait_for_output(&output, &self.readiness)
    }
}
