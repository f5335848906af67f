//! Process-level utilities shared by embedders of the library.

pub mod logging;

pub use logging::init_logging;
