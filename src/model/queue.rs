//! Round-robin placement of top-level branches onto hardware queues.

use crate::model::class_id::MQ_MAJOR;
use crate::model::error::CompileError;

/// Tracks the queue (1..=N) and major the next top-level branch lands on.
///
/// Only top-level branches advance it; everything beneath a branch inherits the branch's major
/// so a flow's classes stay under one queue discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueAssigner {
    queues: u16,
    queue: u16,
    major: u16,
}

impl QueueAssigner {
    pub fn new(queues: u16) -> Result<Self, CompileError> {
        if queues == 0 {
            return Err(CompileError::NoQueues);
        }
        if queues >= MQ_MAJOR {
            return Err(CompileError::MajorOutOfRange {
                queues: u32::from(queues),
            });
        }
        Ok(Self {
            queues,
            queue: 1,
            major: 1,
        })
    }

    pub fn queues(&self) -> u16 {
        self.queues
    }

    pub fn queue(&self) -> u16 {
        self.queue
    }

    pub fn major(&self) -> u16 {
        self.major
    }

    /// Step to the next queue after a top-level branch has been compiled, wrapping after N.
    pub fn advance(&mut self) {
        if self.queue >= self.queues {
            self.queue = 1;
            self.major = 1;
        } else {
            self.queue += 1;
            self.major += 1;
        }
    }
}
