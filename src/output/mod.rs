//! Output module: the dataset folder sink.

mod writer;

pub use writer::*;
