//! Numeric algorithms shared by several functions

pub mod centile;
pub mod newton;
pub mod regression;

pub use centile::{centile, sorted_numbers};
pub use newton::newton_method;
pub use regression::{linear_regression, polynomial_regression, Fit};
