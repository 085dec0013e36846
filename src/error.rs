use thiserror::Error;

/// Everything that can go wrong while building or driving a lander episode.
///
/// None of these are fatal to the process: they are local to one environment
/// instance, and apart from `InvalidConfig` the instance stays usable after a
/// fresh `reset`.
#[derive(Debug, Error)]
pub enum LanderError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid action index {0}, expected 0..=3")]
    InvalidAction(u32),

    #[error("invalid timestep {0}, expected a finite value > 0")]
    InvalidTimestep(f32),

    #[error("step() called before reset()")]
    NotReset,

    #[error("step() called on a terminated episode, call reset() first")]
    EpisodeTerminated,

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "rendering")]
    #[error("window error: {0}")]
    Window(#[from] minifb::Error),
}
