// Library interface for slipstream
// This allows integration tests and benches to access internal modules

pub mod errors;
pub mod fetcher;
pub mod openf1;
pub mod replay;
pub mod ui;

// Re-export commonly used types
pub use errors::SlipstreamError;
pub use fetcher::{Fetcher, MemoryTraceSink};
pub use openf1::{DataSource, OpenF1Client, RecordedSource};
pub use replay::{DriverReplay, ReplayState};
