//! Data boundary: alignment of per-instrument series and columnar conversion.
//!
//! Acquisition and persistence are collaborators outside the engines; this
//! module only shapes already-loaded data into a `PriceTable`.

pub mod align;
pub mod frame;

pub use align::align_series;
pub use frame::{frame_from_columns, frame_from_table, table_from_frame, FrameError, DATE_COLUMN};
