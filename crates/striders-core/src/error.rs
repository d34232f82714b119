use thiserror::Error;

/// Top-level error type for striders-core.
#[derive(Debug, Error)]
pub enum StridersError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}

/// Configuration errors. These abort initialization; the control loop itself
/// never returns an error mid-tick.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid control period: {0} (must be > 0)")]
    InvalidDt(f64),

    #[error("Invalid step time: {0} (must be > dt)")]
    InvalidStepTime(f64),

    #[error("Invalid double support ratio: {0} (must be in [0, 1))")]
    InvalidDoubleSupportRatio(f64),

    #[error("Missing end effector entry for {0}")]
    MissingEndEffector(String),

    #[error("Malformed end effector tuple: {0}")]
    MalformedEndEffector(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Body-model errors surfaced at the model seam.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Joint vector length mismatch: expected {expected}, got {got}")]
    JointCountMismatch { expected: usize, got: usize },

    #[error("Unknown link: {0}")]
    UnknownLink(String),

    #[error("No force sensor for {0}")]
    MissingForceSensor(String),
}

/// Service-boundary errors (start/stop and parameter commands).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Controller is not idle")]
    NotIdle,

    #[error("Footstep plan is empty")]
    EmptyPlan,

    #[error("Footstep legs must alternate")]
    NonAlternatingPlan,
}
