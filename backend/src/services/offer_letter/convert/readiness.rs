use super::ConversionError;
use crate::config::ReadinessPolicy;
use log::debug;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Instant;

/// Waits for a converter to finish writing `path` and returns its bytes.
///
/// Some office suites return before the output is flushed, so the file is
/// checked up to `policy.attempts` times, `policy.interval` apart. A file
/// only counts once it exists and is non-empty. The file is always checked
/// at least once.
pub fn wait_for_output(path: &Path, policy: &ReadinessPolicy) -> Result<Vec<u8>, ConversionError> {
    let started = Instant::now();
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        if let Ok(meta) = fs::metadata(path) {
            if meta.is_file() && meta.len() > 0 {
                debug!("{} ready after {} check(s)", path.display(), attempt);
                return Ok(fs::read(path)?);
            }
        }
        if attempt < attempts {
            thread::sleep(policy.interval);
        }
    }

    Err(ConversionError::Timeout {
        path: path.to_path_buf(),
        waited: started.elapsed(),
    })
}
