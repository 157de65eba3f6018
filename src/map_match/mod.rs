pub mod matcher;

pub use matcher::{RoadMatcher, SnapResult};
