pub mod job;
pub mod operation;
pub mod outcome;
pub mod repo;

// Re-exports for convenience
pub use job::*;
pub use operation::*;
pub use outcome::*;
pub use repo::*;
