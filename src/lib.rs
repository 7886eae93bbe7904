// Weekend flight search across several airline sites

pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod flight;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod session;
pub mod weekend;

// Re-export key types for convenience
pub use cache::{CacheConfig, CacheStatsReport, Clock, SystemClock, TtlCache};
pub use config::{ConfigError, GeneralSettings, RouteConfig, Settings};
pub use error::{ExtractionError, FailureKind, ProviderError, RequestError};
pub use flight::{FlightBatch, FlightRecord, LegQuery};
pub use provider::{FlightSearch, ProviderAdapter};
pub use registry::{ProviderRegistry, RegistryError};
pub use session::{HttpSession, ReqwestSession};
pub use weekend::{LegBound, WeekendError, WeekendFilter};
