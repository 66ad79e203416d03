//! cmdlog client implementation

pub mod logger;

pub use logger::LogClient;
