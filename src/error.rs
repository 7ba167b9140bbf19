use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResampleError {
    #[error("unsupported timeframe `{timeframe}` (expected one of 1s, 1m, 5m)")]
    InvalidTimeframe { timeframe: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("tick_capacity must be greater than zero")]
    ZeroCapacity,
    #[error("analytics_window must be at least 2, got {window}")]
    WindowTooSmall { window: usize },
    #[error("symbols list is empty")]
    NoSymbols,
    #[error(transparent)]
    Timeframe(#[from] ResampleError),
}
