//! Purpose: Shared support library for plugins loaded into a binary-analysis host.
//! Exports: `core` (fault guards, scoped lock, version codec, errors), `diag`, `text`.
//! Role: In-process safety net; the host owns the outer execution loop.
//! Invariants: Nothing above a fault boundary observes a failure from beneath it.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod core;
pub mod diag;
pub mod text;
