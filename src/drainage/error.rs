use thiserror::Error;

/// Invalid drainage configuration, reported before any simulation step runs.
///
/// Returned wrapped in [`anyhow::Error`]; use
/// `err.downcast_ref::<ConfigError>()` to match on the variant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("injection rate must be specified")]
    MissingInjectionRate,
    #[error("injection rate must be positive and finite, got {0}")]
    InvalidInjectionRate(f64),
    #[error("invading phase must be specified")]
    MissingInvadingPhase,
    #[error("pores {0:?} are already defined as outlets")]
    InletIsOutlet(Vec<usize>),
    #[error("pores {0:?} are already defined as inlets")]
    OutletIsInlet(Vec<usize>),
    #[error("pore {pore} is out of range (network has {num_pores} pores)")]
    PoreOutOfRange { pore: usize, num_pores: usize },
    #[error("phase '{phase}' has no property '{property}'")]
    MissingProperty { phase: String, property: String },
    #[error("property '{property}' of phase '{phase}' has {actual} values, expected {expected}")]
    PropertyLength {
        phase: String,
        property: String,
        expected: usize,
        actual: usize,
    },
    #[error("phase '{phase}' has a non-positive viscosity at pore {pore}")]
    InvalidViscosity { phase: String, pore: usize },
    #[error("inlet pores have not been specified")]
    NoInlets,
    #[error("outlet pores have not been specified")]
    NoOutlets,
}
