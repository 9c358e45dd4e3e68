// Audit persistence for refinement runs

pub mod iteration_writer;

pub use iteration_writer::{write_run_result, IterationWriter, PersistedIteration};
