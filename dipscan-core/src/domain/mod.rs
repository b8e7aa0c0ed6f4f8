//! Domain types for dipscan

pub mod bar;
pub mod params;
pub mod trade;

pub use bar::PriceBar;
pub use params::{ParamError, ParameterSet};
pub use trade::{ExitReason, Trade};
