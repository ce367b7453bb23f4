//! Four-stage pipeline orchestration
//!
//! The [Orchestrator] drives one run end to end:
//!
//! 1. Validate the input directory
//! 2. Read each input file into partitions (Input stage)
//! 3. Map each partition to word-count triples (Map stage)
//! 4. Persist map output, wait for barrier B1
//! 5. Shuffle each file's partitions (Shuffle stage)
//! 6. Persist shuffle output, wait for barrier B2
//! 7. Reduce each file's shuffled partitions (Reduce stage)
//! 8. Persist final output, reconcile against the input directory,
//!    and write the success marker
//!
//! Stage implementations are created through plugin factories resolved
//! from a [Registry]. Work units of one stage run concurrently; a
//! barrier separates each stage from the next. The first stage error
//! aborts the run at gather time: in-flight tasks of the same stage
//! finish their unit, later stages never start, and partial output
//! stays on disk for inspection.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use itertools::Itertools;
use log::{debug, info};
use parking_lot::Mutex;
use thiserror::Error;

use crate::barrier::{await_matching_parts, await_subdir_count};
use crate::file::{file_leaves, leaf_name, regular_files, sub_directories};
use crate::input::InputError;
use crate::mapper::MapError;
use crate::parsing::pad_width;
use crate::plugin::{
    self, CreateInputFn, CreateMapperFn, CreateReducerFn, CreateShufflerFn,
    DestroyInputFn, DestroyMapperFn, DestroyReducerFn, DestroyShufflerFn,
    DestroySinkFn, PluginError, ReadMapperOpFn, ReadReducerOpFn,
    ReadShufflerOpFn, Registry, StageInstance,
};
use crate::progress_bar::{Progress, ProgressBar};
use crate::record::Stage;
use crate::reducer::ReduceError;
use crate::shuffler::ShuffleError;
use crate::sink::SinkError;
use crate::traits::{Map, Persist, ReadInput, Reduce, Shuffle};

/// Empty marker file written to the final root on full success
pub const SUCCESS_MARKER: &str = "SUCCESS.ind";

/// An invalid input directory
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Input directory not found: `{0}`")]
    DirectoryMissing(PathBuf),
    #[error("Not a directory: `{0}`")]
    NotADirectory(PathBuf),
    #[error("No files found to process in `{0}`")]
    NoInputFiles(PathBuf),
    #[error("Duplicate input file name `{leaf}`")]
    DuplicateInputName { leaf: String },
    #[error("Failed to list `{path}`")]
    ListFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A pipeline run error
#[derive(Debug, Error)]
pub enum OrchestrateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error("Input stage failed")]
    Input(#[from] InputError),
    #[error("Map stage failed")]
    Map(#[from] MapError),
    #[error("Shuffle stage failed")]
    Shuffle(#[from] ShuffleError),
    #[error("Reduce stage failed")]
    Reduce(#[from] ReduceError),
    #[error("Failed to persist stage output")]
    Sink(#[from] SinkError),
    #[error("Failed to observe `{path}`")]
    ObservationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "Output does not match input: missing in output [{}], missing in input [{}]",
        missing_in_output.iter().join(", "),
        missing_in_input.iter().join(", ")
    )]
    ReconciliationFailed {
        missing_in_output: Vec<String>,
        missing_in_input: Vec<String>,
    },
}

/// The pipeline driver
#[derive(Builder)]
pub struct Orchestrator {
    /// Plugin artifacts providing the stage implementations
    #[builder(default)]
    registry: Registry,
    /// Directory the sinks create their output roots under
    #[builder(default = "PathBuf::from(\".\")")]
    work_dir: PathBuf,
    /// Poll interval of the filesystem-observation barriers
    #[builder(default = "Duration::from_millis(10)")]
    poll_interval: Duration,
}

impl Orchestrator {
    /// Run the full pipeline over the files in `input_dir`
    ///
    /// Returns the final output root, which holds one word-count file
    /// per input file plus [SUCCESS_MARKER].
    pub fn run(&self, input_dir: &Path) -> Result<PathBuf, OrchestrateError> {
        let input_files = validate_input_dir(input_dir)?;
        info!(
            "Processing {} files from {input_dir:?}",
            input_files.len()
        );

        let partitioned = self.run_input_stage(&input_files)?;
        let mapper_root = self.run_map_stage(&partitioned)?;
        await_subdir_count(&mapper_root, input_files.len(), self.poll_interval);
        info!("All map output written under {mapper_root:?}");

        let shuffler_root = self.run_shuffle_stage(&mapper_root)?;
        await_matching_parts(&mapper_root, &shuffler_root, self.poll_interval);
        info!("All shuffle output written under {shuffler_root:?}");

        let final_root = self.run_reduce_stage(&shuffler_root)?;
        reconcile(input_dir, &final_root)?;

        let marker = final_root.join(SUCCESS_MARKER);
        File::create(&marker).map_err(|source| SinkError::SinkWriteFailed {
            path: marker.clone(),
            source,
        })?;
        info!("Pipeline complete, output under {final_root:?}");
        Ok(final_root)
    }

    /// Read every input file into partitions, one task per file
    fn run_input_stage(
        &self,
        input_files: &[PathBuf],
    ) -> Result<BTreeMap<String, Vec<Vec<String>>>, OrchestrateError> {
        let artifact = self.registry.load(plugin::INPUT_READER)?;
        let create: CreateInputFn = artifact.resolve("create_input")?;
        let destroy: DestroyInputFn = artifact.resolve("destroy_input")?;
        let readers: Vec<_> = input_files
            .iter()
            .map(|file| StageInstance::new(create(file.clone()), destroy))
            .collect();
        debug!("dispatching {} {} tasks", readers.len(), Stage::Input);
        let results = fan_out("files read:", readers, |mut reader| {
            reader.run_input()
        });
        let mut partitioned = BTreeMap::new();
        for result in results {
            partitioned.extend(result?);
        }
        Ok(partitioned)
    }

    /// Map every partition and persist the results, one task per
    /// `(file, partition)`
    ///
    /// Returns the map root learned from the first completed write.
    fn run_map_stage(
        &self,
        partitioned: &BTreeMap<String, Vec<Vec<String>>>,
    ) -> Result<PathBuf, OrchestrateError> {
        let artifact = self.registry.load(plugin::WORD_MAPPER)?;
        let create: CreateMapperFn = artifact.resolve("create_mapper")?;
        let destroy: DestroyMapperFn = artifact.resolve("destroy_mapper")?;
        let mut mappers = Vec::new();
        for (name, partitions) in partitioned {
            for (index, lines) in partitions.iter().enumerate() {
                let input =
                    BTreeMap::from([(name.clone(), lines.clone())]);
                let mapper =
                    StageInstance::new(create(index, input), destroy);
                mappers.push((name.clone(), index, mapper));
            }
        }
        debug!("dispatching {} {} tasks", mappers.len(), Stage::Map);
        let mapped =
            fan_out("partitions mapped:", mappers, |(name, index, mut m)| {
                (name, index, m.run_map())
            });

        let artifact = self.registry.load(plugin::MAP_WRITER)?;
        let create: ReadMapperOpFn = artifact.resolve("read_mapper_op")?;
        let destroy: DestroySinkFn = artifact.resolve("destroy_mapper_op")?;
        let mut sinks = Vec::new();
        for (name, index, result) in mapped {
            let raw = result?;
            let pad =
                pad_width(partitioned.get(&name).map(Vec::len).unwrap_or(0));
            let sink = create(self.work_dir.clone(), raw, index, pad);
            sinks.push(StageInstance::new(sink, destroy));
        }
        // files with no partitions produce no mapper results; persist
        // an empty output so the map root still gains their
        // sub-directory and barrier B1 can lift
        for (name, partitions) in partitioned {
            if partitions.is_empty() {
                let raw = BTreeMap::from([(name.clone(), Vec::new())]);
                let sink = create(self.work_dir.clone(), raw, 0, pad_width(0));
                sinks.push(StageInstance::new(sink, destroy));
            }
        }
        let roots =
            fan_out("map outputs written:", sinks, |mut sink| sink.persist());
        learned_root(roots)
    }

    /// Shuffle every map sub-directory and persist the results
    fn run_shuffle_stage(
        &self,
        mapper_root: &Path,
    ) -> Result<PathBuf, OrchestrateError> {
        let artifact = self.registry.load(plugin::PARTITION_SHUFFLER)?;
        let create: CreateShufflerFn = artifact.resolve("create_shuffler")?;
        let destroy: DestroyShufflerFn =
            artifact.resolve("destroy_shuffler")?;
        let map_dirs = sub_directories(mapper_root).map_err(|source| {
            OrchestrateError::ObservationFailed {
                path: mapper_root.to_owned(),
                source,
            }
        })?;
        let shufflers: Vec<_> = map_dirs
            .into_iter()
            .map(|dir| {
                (leaf_name(&dir), StageInstance::new(create(dir), destroy))
            })
            .collect();
        debug!("dispatching {} {} tasks", shufflers.len(), Stage::Shuffle);
        let shuffled =
            fan_out("files shuffled:", shufflers, |(name, mut s)| {
                (name, s.run_shuffle())
            });

        let artifact = self.registry.load(plugin::SHUFFLE_WRITER)?;
        let create: ReadShufflerOpFn = artifact.resolve("read_shuffler_op")?;
        let destroy: DestroySinkFn =
            artifact.resolve("destroy_shuffler_op")?;
        let mut sinks = Vec::new();
        for (name, result) in shuffled {
            let partitions = result?;
            let sink = create(self.work_dir.clone(), name, partitions);
            sinks.push(StageInstance::new(sink, destroy));
        }
        let roots = fan_out("shuffle outputs written:", sinks, |mut sink| {
            sink.persist()
        });
        learned_root(roots)
    }

    /// Reduce every shuffle sub-directory and persist the final output
    fn run_reduce_stage(
        &self,
        shuffler_root: &Path,
    ) -> Result<PathBuf, OrchestrateError> {
        let artifact = self.registry.load(plugin::COUNT_REDUCER)?;
        let create: CreateReducerFn = artifact.resolve("create_reducer")?;
        let destroy: DestroyReducerFn = artifact.resolve("destroy_reducer")?;
        let shuffle_dirs =
            sub_directories(shuffler_root).map_err(|source| {
                OrchestrateError::ObservationFailed {
                    path: shuffler_root.to_owned(),
                    source,
                }
            })?;
        let reducers: Vec<_> = shuffle_dirs
            .into_iter()
            .map(|dir| StageInstance::new(create(dir), destroy))
            .collect();
        debug!("dispatching {} {} tasks", reducers.len(), Stage::Reduce);
        let reduced = fan_out("files reduced:", reducers, |mut reducer| {
            reducer.run_reduce()
        });

        let artifact = self.registry.load(plugin::REDUCE_WRITER)?;
        let create: ReadReducerOpFn = artifact.resolve("read_reducer_op")?;
        let destroy: DestroySinkFn = artifact.resolve("destroy_reducer_op")?;
        let mut sinks = Vec::new();
        for result in reduced {
            let raw = result?;
            let sink = create(self.work_dir.clone(), raw);
            sinks.push(StageInstance::new(sink, destroy));
        }
        let roots = fan_out("final outputs written:", sinks, |mut sink| {
            sink.persist()
        });
        learned_root(roots)
    }
}

/// Dispatch one concurrent task per work unit and gather the results
///
/// Results arrive in completion order; workers surrender ownership of
/// their result when they push it into the shared collection.
fn fan_out<I, T>(
    message: &str,
    items: Vec<I>,
    task: impl Fn(I) -> T + Sync,
) -> Vec<T>
where
    I: Send,
    T: Send,
{
    let progress = ProgressBar::new(items.len() as u64, message);
    let results = Mutex::new(Vec::with_capacity(items.len()));
    rayon::in_place_scope_fifo(|scope| {
        for item in items {
            let results = &results;
            let progress = &progress;
            let task = &task;
            scope.spawn_fifo(move |_| {
                let output = task(item);
                results.lock().push(output);
                progress.inc(1);
            });
        }
    });
    progress.finish();
    results.into_inner()
}

/// Surface sink errors and return the first completed root
///
/// A validated run dispatches at least one sink per stage, so a result
/// is always present.
fn learned_root(
    roots: Vec<Result<PathBuf, SinkError>>,
) -> Result<PathBuf, OrchestrateError> {
    let mut first = None;
    for root in roots {
        let root = root?;
        first.get_or_insert(root);
    }
    Ok(first.unwrap())
}

/// Check the input directory and list its files
fn validate_input_dir(
    input_dir: &Path,
) -> Result<Vec<PathBuf>, ValidationError> {
    use ValidationError::*;

    if !input_dir.exists() {
        return Err(DirectoryMissing(input_dir.to_owned()));
    }
    if !input_dir.is_dir() {
        return Err(NotADirectory(input_dir.to_owned()));
    }
    let files = regular_files(input_dir).map_err(|source| ListFailed {
        path: input_dir.to_owned(),
        source,
    })?;
    if files.is_empty() {
        return Err(NoInputFiles(input_dir.to_owned()));
    }
    let mut seen = BTreeSet::new();
    for file in &files {
        let leaf = leaf_name(file);
        if !seen.insert(leaf.clone()) {
            return Err(DuplicateInputName { leaf });
        }
    }
    Ok(files)
}

/// Final set-equality check between input and output leaf names
fn reconcile(
    input_dir: &Path,
    final_root: &Path,
) -> Result<(), OrchestrateError> {
    let observe = |path: &Path| {
        let path = path.to_owned();
        move |source| OrchestrateError::ObservationFailed { path, source }
    };
    let inputs = file_leaves(input_dir).map_err(observe(input_dir))?;
    let mut outputs = file_leaves(final_root).map_err(observe(final_root))?;
    outputs.remove(SUCCESS_MARKER);
    let missing_in_output: Vec<_> =
        inputs.difference(&outputs).cloned().collect();
    let missing_in_input: Vec<_> =
        outputs.difference(&inputs).cloned().collect();
    if missing_in_output.is_empty() && missing_in_input.is_empty() {
        Ok(())
    } else {
        Err(OrchestrateError::ReconciliationFailed {
            missing_in_output,
            missing_in_input,
        })
    }
}
