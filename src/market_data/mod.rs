pub mod feed;
pub mod ingestor;
pub mod latest_cache;
pub mod resampler;
pub mod tick_store;

pub use ingestor::{IngestStats, Ingestor};
pub use latest_cache::LatestTickCache;
pub use resampler::{resample, resample_ticks, Timeframe};
pub use tick_store::{TickStore, DEFAULT_TICK_CAPACITY};
