//! Purpose: Fault boundaries that keep a failing plugin operation from killing the host.
//! Exports: `Outcome`, `FaultReport`, `trap_faults`, `catch_panics`.
//! Role: Last line of defense at host-facing entry points.
//! Invariants: Nothing above a boundary observes a fault or panic from beneath it.
//! Invariants: Every trapped failure emits exactly one sink line, tagged with the boundary.
//!
//! The two traps are deliberately separate: hardware faults and panics use
//! different propagation mechanisms and cannot share one catch construct.
//! Callers compose them per call site; only the outermost, highest-risk
//! boundaries need the heavier hardware trap. Each trap guards only the
//! calling thread's stack. Nothing is retried and partial side effects of
//! an abandoned operation are not rolled back.

#[cfg(unix)]
mod sys;

use crate::diag;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Disposition of a guarded operation. A trapped failure is reported to
/// the logging sink, never to the caller's error path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    Faulted,
    Panicked,
}

impl<T> Outcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Faulted | Outcome::Panicked => None,
        }
    }
}

/// Transient diagnostic for one trapped hardware fault; formatted into the
/// sink line and then discarded.
#[derive(Clone, Copy, Debug)]
pub struct FaultReport<'a> {
    pub boundary: &'a str,
    pub signal: i32,
    pub address: usize,
}

impl fmt::Display for FaultReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match signal_name(self.signal) {
            Some(name) => write!(
                f,
                "{}: hardware fault {} at {:#x}",
                self.boundary, name, self.address
            ),
            None => write!(
                f,
                "{}: hardware fault signal {} at {:#x}",
                self.boundary, self.signal, self.address
            ),
        }
    }
}

#[cfg(unix)]
fn signal_name(signal: i32) -> Option<&'static str> {
    match signal {
        libc::SIGSEGV => Some("SIGSEGV"),
        libc::SIGBUS => Some("SIGBUS"),
        libc::SIGILL => Some("SIGILL"),
        libc::SIGFPE => Some("SIGFPE"),
        _ => None,
    }
}

#[cfg(not(unix))]
fn signal_name(_signal: i32) -> Option<&'static str> {
    None
}

/// Hardware-fault trap. Runs `op`; a processor-level fault (invalid memory
/// access, bus error, illegal instruction, arithmetic fault) anywhere in
/// the guarded call tree on this thread is converted into one logged
/// report and `Outcome::Faulted`, and execution resumes here instead of
/// taking down the host process.
///
/// The guarded call is abandoned where it faulted: its stack is not
/// unwound, values live inside it are leaked, and a lock held across the
/// fault point stays held. Guarded operations should keep lock scopes
/// inside the riskiest code, not around it.
///
/// Panics are not hardware faults and pass through untouched; compose
/// with [`catch_panics`] where both matter.
#[cfg(unix)]
pub fn trap_faults<T>(boundary: &str, op: impl FnOnce() -> T) -> Outcome<T> {
    match sys::run_guarded(op) {
        Ok(value) => Outcome::Completed(value),
        Err(fault) => {
            let report = FaultReport {
                boundary,
                signal: fault.signal,
                address: fault.address,
            };
            diag::emit(&report.to_string());
            Outcome::Faulted
        }
    }
}

/// No trap mechanism on this target; the operation runs unguarded.
#[cfg(not(unix))]
pub fn trap_faults<T>(boundary: &str, op: impl FnOnce() -> T) -> Outcome<T> {
    let _ = boundary;
    Outcome::Completed(op())
}

/// Language-level exception trap. Runs `op`; a panic carrying a message
/// payload is logged verbatim under the boundary tag, any other payload is
/// logged as a generic failure. Both cases are fully absorbed.
pub fn catch_panics<T>(boundary: &str, op: impl FnOnce() -> T) -> Outcome<T> {
    match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(value) => Outcome::Completed(value),
        Err(payload) => {
            let line = if let Some(message) = payload.downcast_ref::<&str>() {
                format!("{boundary}: panic: {message}")
            } else if let Some(message) = payload.downcast_ref::<String>() {
                format!("{boundary}: panic: {message}")
            } else {
                format!("{boundary}: panic (no message)")
            };
            diag::emit(&line);
            Outcome::Panicked
        }
    }
}
