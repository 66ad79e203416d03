//! Core data types shared by the stores and the server

pub mod entry;

pub use entry::Entry;
