//! Protocol decoding modules.
//!
//! Each protocol follows a layered structure:
//! - `layout`: byte offsets and constants (source of truth)
//! - `reader`: bounds-checked byte access
//! - `parser`: domain-level decoding (no direct byte indexing)
//! - `error`: one explicit error per validation step
//!
//! Parsers are pure and contain no I/O; the receiver and capture sources
//! handle sockets and files.

pub mod sacn;
