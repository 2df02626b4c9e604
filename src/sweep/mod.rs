//! Parameter sweep: grid enumeration and the dataset generator.

mod driver;
mod grid;

pub use driver::*;
pub use grid::*;
