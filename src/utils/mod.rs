//! Shared utilities

mod logger;
mod timer;
mod workdir;

pub use logger::init_logger;
pub use timer::Timer;
pub use workdir::ScopedWorkdir;
