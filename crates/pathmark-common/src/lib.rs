pub mod formatter;
pub mod grouping;
pub mod protocol;
pub mod record;

pub use grouping::{GroupedRecords, Grouping, group_records};
pub use record::{
    BoundingBox, CapturedElement, ElementMetadata, LocatorRecord, LocatorSet, LocatorStats,
    ResolutionResult, SelectOption, Strategy, StrategyCounter,
};
