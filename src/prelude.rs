pub use crate::{
    orchestrator::{Orchestrator, OrchestratorBuilder, SUCCESS_MARKER},
    plugin::{Artifact, Registry},
    record::{Count, Stage, WordTriple},
    traits::{Map, Persist, ReadInput, Reduce, Shuffle},
};
