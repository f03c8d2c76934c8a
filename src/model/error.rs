use crate::model::plan::Direction;

/// Fatal conditions raised while compiling a topology into a plan.
///
/// Input is assumed to have been validated by the loaders; these cover values the loaders accept
/// but that cannot produce a sane class hierarchy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("no hardware queues available")]
    NoQueues,
    #[error("queue count {queues} exceeds the largest usable major number")]
    MajorOutOfRange { queues: u32 },
    #[error("minor class identifiers exhausted for major {major:x}")]
    MinorExhausted { major: u16 },
    #[error("node '{node}' has invalid {direction} capacity {value}")]
    InvalidNodeCapacity {
        node: String,
        direction: Direction,
        value: f64,
    },
    #[error("device '{device}' has invalid {field} of {value} Mbps")]
    InvalidDeviceRate {
        device: String,
        field: &'static str,
        value: u32,
    },
}
