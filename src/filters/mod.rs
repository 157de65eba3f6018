pub mod location_filter;

pub use location_filter::LocationFilter;
