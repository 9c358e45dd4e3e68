// bugrefine - iterative critique-and-refine loop for LLM bug analyses
// Library exports

pub mod claude;
pub mod cli;
pub mod config;
pub mod critic;
pub mod fetch;
pub mod generators;
pub mod persist;
pub mod refinement;
