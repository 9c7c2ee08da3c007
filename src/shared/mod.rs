pub mod digest;
pub mod fs_atomic;
pub mod host;
pub mod ids;
pub mod logging;
pub mod time;
