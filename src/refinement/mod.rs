// Iterative refinement of bug analyses
//
// A critic scores the current analysis, may hand back an improved one, and may
// ask for one more piece of evidence (a file or a code search). The controller
// folds that evidence into the context and repeats until the analysis converges,
// the iteration budget runs out, or the critic fails.

pub mod controller;
pub mod ledger;
pub mod types;

pub use controller::{check_convergence, Convergence, RefinementController, FAILURE_CRITIQUE};
pub use ledger::IterationLedger;
pub use types::{
    AnalysisSnapshot, ContextEntry, ContextStore, DataRequest, FetchOutcome, FetchedArtifact,
    IterationRecord, RequestKind, RunResult, TerminatedBy,
};
