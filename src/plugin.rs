//! Plugin artifacts and typed factory resolution
//!
//! Stage implementations are pluggable: each lives in an artifact
//! registered under a fixed relative path and exposes named factory
//! symbols for construction and destruction. Artifacts are registered
//! at build time (see [Registry::builtin]); replacing one is a matter
//! of registering a different artifact under the same path.

use std::any::Any;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::input::InputError;
use crate::mapper::MapError;
use crate::record::{FilePartition, MapOutput, ReduceOutput, ShuffleOutput};
use crate::reducer::ReduceError;
use crate::shuffler::ShuffleError;
use crate::sink::SinkError;
use crate::traits::{Map, Persist, ReadInput, Reduce, Shuffle};

/// Artifact holding the input reader
pub const INPUT_READER: &str = "libs/fp/input_reader";
/// Artifact holding the mapper
pub const WORD_MAPPER: &str = "libs/map/word_mapper";
/// Artifact holding the map-output writer
pub const MAP_WRITER: &str = "libs/fp/map_writer";
/// Artifact holding the shuffler
pub const PARTITION_SHUFFLER: &str = "libs/shuffle/partition_shuffler";
/// Artifact holding the shuffle-output writer
pub const SHUFFLE_WRITER: &str = "libs/fp/shuffle_writer";
/// Artifact holding the reducer
pub const COUNT_REDUCER: &str = "libs/reduce/count_reducer";
/// Artifact holding the final-output writer
pub const REDUCE_WRITER: &str = "libs/fp/reduce_writer";

/// Stage instances produced by the factories
pub type BoxedInput = Box<dyn ReadInput<Error = InputError> + Send>;
pub type BoxedMapper = Box<dyn Map<Error = MapError> + Send>;
pub type BoxedShuffler = Box<dyn Shuffle<Error = ShuffleError> + Send>;
pub type BoxedReducer = Box<dyn Reduce<Error = ReduceError> + Send>;
pub type BoxedSink = Box<dyn Persist<Error = SinkError> + Send>;

/// Constructor for an input reader over one file
pub type CreateInputFn = fn(PathBuf) -> BoxedInput;
pub type DestroyInputFn = fn(BoxedInput);
/// Constructor for a mapper over one `(partition, lines)` pair
pub type CreateMapperFn = fn(usize, FilePartition) -> BoxedMapper;
pub type DestroyMapperFn = fn(BoxedMapper);
/// Constructor for a map-output writer: working directory, raw mapper
/// output, index of the first partition, zero-padding width
pub type ReadMapperOpFn = fn(PathBuf, MapOutput, usize, usize) -> BoxedSink;
/// Constructor for a shuffler over one map-output sub-directory
pub type CreateShufflerFn = fn(PathBuf) -> BoxedShuffler;
pub type DestroyShufflerFn = fn(BoxedShuffler);
/// Constructor for a shuffle-output writer: working directory, file
/// name, shuffled partitions
pub type ReadShufflerOpFn = fn(PathBuf, String, ShuffleOutput) -> BoxedSink;
/// Constructor for a reducer over one shuffle-output sub-directory
pub type CreateReducerFn = fn(PathBuf) -> BoxedReducer;
pub type DestroyReducerFn = fn(BoxedReducer);
/// Constructor for a final-output writer: working directory, reduced
/// counts
pub type ReadReducerOpFn = fn(PathBuf, ReduceOutput) -> BoxedSink;
/// Destructor shared by the three persistence writers
pub type DestroySinkFn = fn(BoxedSink);

mod sealed {
    pub trait Sealed {}
}

/// Factory-function types the loader can resolve
///
/// Implemented for the factory set above and nothing else, so
/// resolving an unsupported factory type does not compile.
pub trait FactoryFn: sealed::Sealed + Any + Copy + Send + Sync {}

impl sealed::Sealed for CreateInputFn {}
impl FactoryFn for CreateInputFn {}
impl sealed::Sealed for DestroyInputFn {}
impl FactoryFn for DestroyInputFn {}
impl sealed::Sealed for CreateMapperFn {}
impl FactoryFn for CreateMapperFn {}
impl sealed::Sealed for DestroyMapperFn {}
impl FactoryFn for DestroyMapperFn {}
impl sealed::Sealed for ReadMapperOpFn {}
impl FactoryFn for ReadMapperOpFn {}
impl sealed::Sealed for CreateShufflerFn {}
impl FactoryFn for CreateShufflerFn {}
impl sealed::Sealed for DestroyShufflerFn {}
impl FactoryFn for DestroyShufflerFn {}
impl sealed::Sealed for ReadShufflerOpFn {}
impl FactoryFn for ReadShufflerOpFn {}
impl sealed::Sealed for CreateReducerFn {}
impl FactoryFn for CreateReducerFn {}
impl sealed::Sealed for DestroyReducerFn {}
impl FactoryFn for DestroyReducerFn {}
impl sealed::Sealed for ReadReducerOpFn {}
impl FactoryFn for ReadReducerOpFn {}
impl sealed::Sealed for DestroySinkFn {}
impl FactoryFn for DestroySinkFn {}

/// A plugin loading or resolution error
///
/// Both variants are terminal for the orchestration; there is no
/// retry.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Cannot load plugin artifact `{path}`: {message}")]
    PluginOpenError { path: PathBuf, message: String },
    #[error("Cannot load symbol `{symbol}` from `{path}`: {message}")]
    SymbolMissing {
        path: PathBuf,
        symbol: String,
        message: String,
    },
}

/// One plugin artifact: a set of named factory symbols
#[derive(Clone)]
pub struct Artifact {
    path: &'static str,
    symbols: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl Artifact {
    pub fn new(path: &'static str) -> Self {
        Self {
            path,
            symbols: HashMap::new(),
        }
    }

    /// Register a factory under `symbol`
    pub fn with_symbol<F: FactoryFn>(
        mut self,
        symbol: &'static str,
        factory: F,
    ) -> Self {
        self.symbols.insert(symbol, Arc::new(factory));
        self
    }

    /// Resolve the factory registered under `symbol`
    ///
    /// The registered factory must have exactly the type `F`.
    pub fn resolve<F: FactoryFn>(
        &self,
        symbol: &str,
    ) -> Result<F, PluginError> {
        let missing = |message: &str| PluginError::SymbolMissing {
            path: PathBuf::from(self.path),
            symbol: symbol.to_owned(),
            message: message.to_owned(),
        };
        let factory = self
            .symbols
            .get(symbol)
            .ok_or_else(|| missing("symbol not registered"))?;
        factory
            .as_ref()
            .downcast_ref::<F>()
            .copied()
            .ok_or_else(|| missing("factory has a different type"))
    }
}

/// The set of registered plugin artifacts, keyed by relative path
#[derive(Clone)]
pub struct Registry {
    artifacts: HashMap<&'static str, Artifact>,
}

impl Registry {
    /// A registry with no artifacts
    pub fn empty() -> Self {
        Self {
            artifacts: HashMap::new(),
        }
    }

    /// The registry of built-in stage implementations
    pub fn builtin() -> Self {
        use crate::{input, mapper, reducer, shuffler, sink};

        let mut registry = Self::empty();
        registry.register(
            Artifact::new(INPUT_READER)
                .with_symbol(
                    "create_input",
                    input::create_input as CreateInputFn,
                )
                .with_symbol(
                    "destroy_input",
                    input::destroy_input as DestroyInputFn,
                ),
        );
        registry.register(
            Artifact::new(WORD_MAPPER)
                .with_symbol(
                    "create_mapper",
                    mapper::create_mapper as CreateMapperFn,
                )
                .with_symbol(
                    "destroy_mapper",
                    mapper::destroy_mapper as DestroyMapperFn,
                ),
        );
        registry.register(
            Artifact::new(MAP_WRITER)
                .with_symbol(
                    "read_mapper_op",
                    sink::read_mapper_op as ReadMapperOpFn,
                )
                .with_symbol(
                    "destroy_mapper_op",
                    sink::destroy_mapper_op as DestroySinkFn,
                ),
        );
        registry.register(
            Artifact::new(PARTITION_SHUFFLER)
                .with_symbol(
                    "create_shuffler",
                    shuffler::create_shuffler as CreateShufflerFn,
                )
                .with_symbol(
                    "destroy_shuffler",
                    shuffler::destroy_shuffler as DestroyShufflerFn,
                ),
        );
        registry.register(
            Artifact::new(SHUFFLE_WRITER)
                .with_symbol(
                    "read_shuffler_op",
                    sink::read_shuffler_op as ReadShufflerOpFn,
                )
                .with_symbol(
                    "destroy_shuffler_op",
                    sink::destroy_shuffler_op as DestroySinkFn,
                ),
        );
        registry.register(
            Artifact::new(COUNT_REDUCER)
                .with_symbol(
                    "create_reducer",
                    reducer::create_reducer as CreateReducerFn,
                )
                .with_symbol(
                    "destroy_reducer",
                    reducer::destroy_reducer as DestroyReducerFn,
                ),
        );
        registry.register(
            Artifact::new(REDUCE_WRITER)
                .with_symbol(
                    "read_reducer_op",
                    sink::read_reducer_op as ReadReducerOpFn,
                )
                .with_symbol(
                    "destroy_reducer_op",
                    sink::destroy_reducer_op as DestroySinkFn,
                ),
        );
        registry
    }

    /// Add or replace an artifact
    ///
    /// This is the pluggable-replacement seam: registering a different
    /// artifact under a built-in path swaps out that stage.
    pub fn register(&mut self, artifact: Artifact) {
        self.artifacts.insert(artifact.path, artifact);
    }

    /// Drop the artifact registered at `path`
    pub fn remove(&mut self, path: &str) -> Option<Artifact> {
        self.artifacts.remove(path)
    }

    /// Open the artifact at `path`
    pub fn load(&self, path: impl AsRef<Path>) -> Result<&Artifact, PluginError> {
        let path = path.as_ref();
        let key = path.to_string_lossy();
        self.artifacts.get(key.as_ref()).ok_or_else(|| {
            PluginError::PluginOpenError {
                path: path.to_owned(),
                message: "artifact is not registered".to_owned(),
            }
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// A stage instance paired with its destructor factory
///
/// The destructor runs on drop, after the orchestrator has consumed
/// the instance's output.
pub struct StageInstance<T: ?Sized> {
    instance: Option<Box<T>>,
    destroy: fn(Box<T>),
}

impl<T: ?Sized> StageInstance<T> {
    pub fn new(instance: Box<T>, destroy: fn(Box<T>)) -> Self {
        Self {
            instance: Some(instance),
            destroy,
        }
    }
}

impl<T: ?Sized> Deref for StageInstance<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // `instance` is only vacated on drop
        self.instance.as_deref().unwrap()
    }
}

impl<T: ?Sized> DerefMut for StageInstance<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.instance.as_deref_mut().unwrap()
    }
}

impl<T: ?Sized> Drop for StageInstance<T> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            (self.destroy)(instance)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::input::create_input;

    #[test]
    fn resolve_builtin_factories() {
        let registry = Registry::builtin();
        let artifact = registry.load(INPUT_READER).unwrap();
        let create: CreateInputFn =
            artifact.resolve("create_input").unwrap();
        let mut reader = create(PathBuf::from("does-not-matter"));
        assert!(reader.run_input().is_err());
    }

    #[test]
    fn unknown_artifact() {
        let registry = Registry::builtin();
        let res = registry.load("libs/map/not_registered");
        assert!(matches!(
            res,
            Err(PluginError::PluginOpenError { .. })
        ));
    }

    #[test]
    fn unknown_symbol() {
        let registry = Registry::builtin();
        let artifact = registry.load(WORD_MAPPER).unwrap();
        let res = artifact.resolve::<CreateMapperFn>("create_input");
        assert!(matches!(res, Err(PluginError::SymbolMissing { .. })));
    }

    #[test]
    fn mistyped_symbol() {
        let registry = Registry::builtin();
        let artifact = registry.load(INPUT_READER).unwrap();
        let res = artifact.resolve::<CreateShufflerFn>("create_input");
        assert!(matches!(res, Err(PluginError::SymbolMissing { .. })));
    }

    static DESTROYED: AtomicUsize = AtomicUsize::new(0);

    fn counting_destroy(reader: BoxedInput) {
        DESTROYED.fetch_add(1, Ordering::SeqCst);
        drop(reader)
    }

    #[test]
    fn destructor_factory_runs_on_drop() {
        let before = DESTROYED.load(Ordering::SeqCst);
        let instance = StageInstance::new(
            create_input(PathBuf::from("x")),
            counting_destroy as DestroyInputFn,
        );
        drop(instance);
        assert_eq!(DESTROYED.load(Ordering::SeqCst), before + 1);
    }
}
