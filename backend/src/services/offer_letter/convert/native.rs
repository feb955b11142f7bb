use super::{
    run_tool, scratch_dir, wait_for_output, AutomationSession, ConversionError, ConverterSession,
    DocumentConverter,
};
use crate::config::ReadinessPolicy;
use log::info;
use std::fs;
use std::path::PathBuf;

/// Converts by driving a desktop word processor through an automation
/// bridge: `<program> <input.docx> <output.pdf>`.
///
/// The bridge must run inside an [`AutomationSession`]. A caller that opened
/// one with [`DocumentConverter::begin_session`] keeps it across several
/// conversions; otherwise each conversion opens and closes its own.
#[derive(Debug, Clone)]
pub struct NativeOfficeConverter {
    program: String,
    teardown: Option<Vec<String>>,
    work_dir: Option<PathBuf>,
    readiness: ReadinessPolicy,
}

impl NativeOfficeConverter {
    pub fn new(
        program: String,
        teardown: Option<Vec<String>>,
        work_dir: Option<PathBuf>,
        readiness: ReadinessPolicy,
    ) -> Self {
        Self {
            program,
            teardown,
            work_dir,
            readiness,
        }
    }
}

impl DocumentConverter for NativeOfficeConverter {
    fn name(&self) -> &'static str {
        "native"
    }

    fn begin_session(&self) -> Result<ConverterSession, ConversionError> {
        Ok(ConverterSession::automation(AutomationSession::enter(
            self.teardown.clone(),
        )))
    }

    fn convert(&self, source: &[u8], file_stem: &str) -> Result<Vec<u8>, ConversionError> {
        let _session = AutomationSession::enter(self.teardown.clone());
        let scratch = scratch_dir(self.work_dir.as_deref())?;
        let input = scratch.path().join(format!("{file_stem}.docx"));
        let output = scratch.path().join(format!("{file_stem}.pdf"));
        fs::write(&input, source)?;

        info!("converting {} with {}", input.display(), self.program);
        run_tool(&self.program, [&input, &output])?;

        wait_for_output(&output, &self.readiness)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::services::offer_letter::convert::tests::{fake_tool, ALWAYS_FAILS};
    use std::path::Path;
    use std::time::Duration;

    const NATIVE_OK: &str = r#"printf '%%PDF native' > "$2""#;

    fn converter(tool: &Path, teardown: &Path, work_dir: &Path) -> NativeOfficeConverter {
        NativeOfficeConverter::new(
            tool.display().to_string(),
            Some(vec![teardown.display().to_string()]),
            Some(work_dir.to_path_buf()),
            ReadinessPolicy {
                attempts: 3,
                interval: Duration::from_millis(10),
            },
        )
    }

    fn teardown_script(dir: &Path) -> (PathBuf, PathBuf) {
        let log = dir.join("teardown.log");
        let script = fake_tool(dir, "teardown", &format!("echo done >> '{}'", log.display()));
        (script, log)
    }

    #[test]
    fn converts_inside_a_session() {
        let tools = tempfile::tempdir().expect("tempdir");
        let work = tempfile::tempdir().expect("tempdir");
        let tool = fake_tool(tools.path(), "word-bridge", NATIVE_OK);
        let (teardown, log) = teardown_script(tools.path());
        let converter = converter(&tool, &teardown, work.path());

        std::thread::spawn(move || {
            let session = converter.begin_session().expect("session");
            assert!(session.is_active());
            let first = converter.convert(b"docx", "OfferLetter_1").expect("first");
            let second = converter.convert(b"docx", "OfferLetter_2").expect("second");
            assert_eq!(first, b"%PDF native");
            assert_eq!(second, b"%PDF native");
            assert!(!log.exists(), "teardown waits for the outer session");
            drop(session);
            assert_eq!(fs::read_to_string(&log).expect("teardown ran"), "done\n");
        })
        .join()
        .expect("conversion thread");

        assert_eq!(fs::read_dir(work.path()).expect("list").count(), 0);
    }

    #[test]
    fn failure_still_tears_down_once() {
        let tools = tempfile::tempdir().expect("tempdir");
        let work = tempfile::tempdir().expect("tempdir");
        let tool = fake_tool(tools.path(), "word-bridge", ALWAYS_FAILS);
        let (teardown, log) = teardown_script(tools.path());
        let converter = converter(&tool, &teardown, work.path());

        std::thread::spawn(move || {
            assert!(matches!(
                converter.convert(b"docx", "OfferLetter_3"),
                Err(ConversionError::ProcessFailed { .. })
            ));
            assert_eq!(fs::read_to_string(&log).expect("teardown ran"), "done\n");
        })
        .join()
        .expect("conversion thread");

        assert_eq!(fs::read_dir(work.path()).expect("list").count(), 0);
    }
}
