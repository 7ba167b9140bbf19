// =============================================================================
// pairwatch — streaming tick ingestion, candle resampling and pairs analytics
// =============================================================================
//
// Data flow:
//   feed adapter → Ingestor → {TickStore, LatestTickCache}
//                → resample (on demand) → pair analytics (on demand)
//                → presentation (api) / persistence (storage)
// =============================================================================

pub mod analytics;
pub mod api;
pub mod app_state;
pub mod error;
pub mod market_data;
pub mod runtime_config;
pub mod storage;
pub mod types;

pub use app_state::AppState;
pub use error::{ConfigError, ResampleError};
pub use types::{Candle, FeedEvent, LatestTick, Tick};
