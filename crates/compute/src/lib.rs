pub mod combinatorial;
pub mod engine;
pub mod extract;
pub mod metrics;
pub mod segment;
pub mod shapes;

pub use combinatorial::{
    CombinatorialMatcher, CombinatorialReport, Coverage, MilpSolver, SetPackingProblem,
    SetPackingSolver, SolverError,
};
pub use engine::{DisaggEngine, EventOutcome, RunReport};
pub use extract::{extract, ExtractionReport, ThresholdMode};
pub use metrics::RunMetrics;
pub use segment::segment;
pub use shapes::{MatchStage, ShapeMatcher, StageOutcome};
