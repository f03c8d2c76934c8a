//! Class identifiers and their allocation.
//!
//! A class id is a tc handle split into `major:minor` (16:16 bits). The major mirrors the
//! hardware queue the class lives on; minors 1 and 2 of every major are taken by the queue's
//! root class and its default class, so allocation starts at 3.

use crate::model::error::CompileError;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Minor of the per-queue root class (`q:1`).
pub const ROOT_MINOR: u16 = 1;
/// Minor of the per-queue default class (`q:2`).
pub const DEFAULT_MINOR: u16 = 2;
/// First minor handed out to topology nodes and devices.
pub const FIRST_MINOR: u16 = 3;
/// Largest minor handed out. `ffff` is left alone since the kernel treats it specially.
pub const MAX_MINOR: u16 = 0xFFFE;
/// Major of the multi-queue root group (`7fff:`); queue majors must stay below it.
pub const MQ_MAJOR: u16 = 0x7FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId {
    pub major: u16,
    pub minor: u16,
}

impl ClassId {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Root class of a hardware queue (`q:1`).
    pub const fn queue_root(major: u16) -> Self {
        Self::new(major, ROOT_MINOR)
    }

    /// Default class of a hardware queue (`q:2`).
    pub const fn queue_default(major: u16) -> Self {
        Self::new(major, DEFAULT_MINOR)
    }
}

/// Printed in hex, which is how `tc` parses handles.
impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}:{:x}", self.major, self.minor)
    }
}

impl Serialize for ClassId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Hands out minors per major: one counter per major, created at [`FIRST_MINOR`] on first use.
///
/// Owned by a single compilation; two runs never share counters.
#[derive(Debug, Clone, Default)]
pub struct ClassIdAllocator {
    next: BTreeMap<u16, u32>,
}

impl ClassIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current minor for `major` and advance its counter.
    pub fn next_minor(&mut self, major: u16) -> Result<u16, CompileError> {
        let next = self.next.entry(major).or_insert(u32::from(FIRST_MINOR));
        let minor = u16::try_from(*next)
            .ok()
            .filter(|m| *m <= MAX_MINOR)
            .ok_or(CompileError::MinorExhausted { major })?;
        *next += 1;
        Ok(minor)
    }

    pub fn next_class(&mut self, major: u16) -> Result<ClassId, CompileError> {
        Ok(ClassId::new(major, self.next_minor(major)?))
    }

    /// Minor the next call for `major` would return, if it has been used at all.
    #[cfg(test)]
    pub fn peek(&self, major: u16) -> Option<u32> {
        self.next.get(&major).copied()
    }
}
