pub mod client;

// Re-exports
pub use client::*;
