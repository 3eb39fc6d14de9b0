//! Price windowing: calendar partitioning of a price table for rebalancing.

pub mod frequency;
pub mod window;

pub use frequency::RebalanceFrequency;
pub use window::{CalendarWindows, EligibleWindows, EstimationWindow, PriceWindowing, Window};
