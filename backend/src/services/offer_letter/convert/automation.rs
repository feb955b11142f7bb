//! Per-thread session for desktop office automation.
//!
//! A desktop word processor driven through automation has to be set up on
//! the thread that uses it and torn down when that thread is done, or the
//! process lingers and keeps the next conversion from starting. Sessions
//! nest: only the outermost one on a thread runs the teardown.

use log::{debug, warn};
use std::cell::Cell;
use std::marker::PhantomData;
use std::process::{Command, Stdio};

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Guard for one automation session on the current thread.
///
/// Not `Send`: the session belongs to the thread that opened it.
#[derive(Debug)]
pub struct AutomationSession {
    teardown: Option<Vec<String>>,
    _thread_bound: PhantomData<*const ()>,
}

impl AutomationSession {
    pub fn enter(teardown: Option<Vec<String>>) -> Self {
        let depth = DEPTH.with(|depth| {
            depth.set(depth.get() + 1);
            depth.get()
        });
        if depth == 1 {
            debug!("automation session opened on {:?}", std::thread::current().id());
        }
        Self {
            teardown,
            _thread_bound: PhantomData,
        }
    }

    /// Number of sessions currently open on this thread.
    pub fn depth() -> usize {
        DEPTH.with(Cell::get)
    }
}

impl Drop for AutomationSession {
    fn drop(&mut self) {
        let remaining = DEPTH.with(|depth| {
            depth.set(depth.get().saturating_sub(1));
            depth.get()
        });
        if remaining > 0 {
            return;
        }

        debug!("automation session closed on {:?}", std::thread::current().id());
        let Some((program, args)) = self.teardown.as_deref().and_then(<[String]>::split_first)
        else {
            return;
        };
        match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => {}
            Ok(status) => warn!("automation teardown '{}' exited with {}", program, status),
            Err(err) => warn!("automation teardown '{}' could not run: {}", program, err),
        }
    }
}
