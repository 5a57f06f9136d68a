pub mod dependencies;

pub use dependencies::*;
