//! Schema standardization — reconciles per-platform export layouts into the
//! canonical record shape.

pub mod standardise;

pub use standardise::{parse_date, parse_numeric, standardise};
