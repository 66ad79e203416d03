//! Line protocol: command framing and classification

pub mod command;
pub mod framer;

pub use command::{Command, SEEK_PREFIX};
pub use framer::{CommandFramer, TERMINATOR};
