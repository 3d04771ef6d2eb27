//! Error types for binding setup and per-tick simulation.

/// A scene definition that cannot be bound to the physics engine.
///
/// These are raised while a [`RobotBinding`](crate::RobotBinding) is being
/// built and indicate a broken robot definition rather than a transient fault.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindingError {
    #[error("{kind} port {port} is out of range (0..{count})")]
    PortOutOfRange {
        kind: PortKind,
        port: usize,
        count: usize,
    },

    #[error("{kind} port {port} is bound twice (\"{first}\" and \"{second}\")")]
    DuplicatePort {
        kind: PortKind,
        port: usize,
        first: String,
        second: String,
    },

    #[error("missing joint \"{0}\"")]
    MissingJoint(String),

    #[error("missing link \"{0}\"")]
    MissingLink(String),

    #[error("invalid parameter {parameter} on \"{node}\": {reason}")]
    InvalidParameter {
        node: String,
        parameter: &'static str,
        reason: String,
    },

    #[error("engine could not create geometry for \"{node}\": {source}")]
    Geometry { node: String, source: EngineError },
}

/// The class of hardware port a node is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    Motor,
    Servo,
    Analog,
    Digital,
}

impl std::fmt::Display for PortKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PortKind::Motor => "motor",
            PortKind::Servo => "servo",
            PortKind::Analog => "analog",
            PortKind::Digital => "digital",
        };
        f.write_str(name)
    }
}

/// A failure reported by the physics collaborator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("unknown joint {0}")]
    UnknownJoint(u32),

    #[error("unknown link {0}")]
    UnknownLink(u32),

    #[error("unknown trace {0}")]
    UnknownTrace(u32),

    #[error("engine query failed: {0}")]
    Query(String),
}

/// A tick that could not complete. The command batch of that tick is dropped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TickError {
    #[error("motor port {port}: {source}")]
    Motor { port: usize, source: EngineError },

    #[error("servo port {port}: {source}")]
    Servo { port: usize, source: EngineError },

    #[error("{kind} sensor on port {port}: {source}")]
    Sensor {
        kind: PortKind,
        port: usize,
        source: EngineError,
    },

    #[error("robot origin: {0}")]
    Origin(EngineError),
}
