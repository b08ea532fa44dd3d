//! Domain types for SignalBoard

pub mod bar;
pub mod signal;
pub mod snapshot;
pub mod timeframe;

pub use bar::Bar;
pub use signal::{Direction, PatternPolarity, VolumeSignal};
pub use snapshot::{IndicatorSnapshot, SnapshotError};
pub use timeframe::{Mode, ParseError, Timeframe};

/// Symbol type alias
pub type Symbol = String;
