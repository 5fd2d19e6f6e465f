//! Directory-based lifecycle of artifact files
//!
//! Every lifecycle stage is a directory and a file lives in exactly one of
//! them. Moving a file is the only way it changes stage, so the state of every
//! file can be recovered after a crash by looking at the directories alone.
//!
//! # Transitions
//!
//! ```text
//! from ──Imported(accepted)──▶ accepted ──Queued──▶ in-queue ──ExportConfirmed──▶ confirmed
//!   │                                                   └──ExportAlreadyExists──▶ already-exists
//!   ├──Imported(rejected)───▶ rejected
//!   ├──Imported(failed)─────▶ failed
//!   └──Imported(duplicate)──▶ already-exists
//! ```
//!
//! [`transition`] is a pure function over these edges; [`Lifecycle::advance`]
//! performs the matching rename. With backups enabled, a copy is written to
//! `backup` before a file leaves `from`.

use crate::io::discovery::pending_files;
use crate::io::integrity::companion_path;
use crate::io::result_artifact::{result_path, write_outcome_csv};
use crate::types::{ArtifactKind, ImportError, ImportOutcome, ImportStatus, Stage};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Something that happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The import pipeline produced a final outcome
    Imported(ImportStatus),
    /// The downstream export was triggered
    Queued,
    ExportConfirmed,
    ExportAlreadyExists,
}

/// Next stage for `event` in `stage`, `None` when no such edge exists
pub fn transition(stage: Stage, event: Event) -> Option<Stage> {
    match (stage, event) {
        (Stage::From, Event::Imported(ImportStatus::Accepted)) => Some(Stage::Accepted),
        (Stage::From, Event::Imported(ImportStatus::Rejected)) => Some(Stage::Rejected),
        (Stage::From, Event::Imported(ImportStatus::Failed)) => Some(Stage::Failed),
        (Stage::From, Event::Imported(ImportStatus::Duplicate)) => Some(Stage::AlreadyExists),
        (Stage::Accepted, Event::Queued) => Some(Stage::InQueue),
        (Stage::InQueue, Event::ExportConfirmed) => Some(Stage::Confirmed),
        (Stage::InQueue, Event::ExportAlreadyExists) => Some(Stage::AlreadyExists),
        _ => None,
    }
}

/// Stage directories of one artifact kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySet {
    paths: HashMap<Stage, PathBuf>,
}

impl DirectorySet {
    /// One sub-directory per stage under `root`
    pub fn from_root(root: &Path) -> Self {
        Self {
            paths: Stage::ALL
                .iter()
                .map(|stage| (*stage, root.join(stage.dir_name())))
                .collect(),
        }
    }

    /// Replace the location of a single stage
    pub fn with_stage(mut self, stage: Stage, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(stage, path.into());
        self
    }

    pub fn path(&self, stage: Stage) -> &Path {
        // every stage is inserted by from_root
        self.paths
            .get(&stage)
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new(stage.dir_name()))
    }
}

/// Directory sets for every artifact kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    sets: HashMap<ArtifactKind, DirectorySet>,
}

impl DirectoryLayout {
    /// `<root>/<kind>/<stage>`, with per-kind roots replaced by `overrides`
    pub fn new(root: &Path, overrides: &BTreeMap<ArtifactKind, PathBuf>) -> Self {
        Self {
            sets: ArtifactKind::ALL
                .iter()
                .map(|kind| {
                    let kind_root = overrides
                        .get(kind)
                        .cloned()
                        .unwrap_or_else(|| root.join(kind.dir_name()));
                    (*kind, DirectorySet::from_root(&kind_root))
                })
                .collect(),
        }
    }

    pub fn with_set(mut self, kind: ArtifactKind, set: DirectorySet) -> Self {
        self.sets.insert(kind, set);
        self
    }

    pub fn set(&self, kind: ArtifactKind) -> DirectorySet {
        self.sets
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| DirectorySet::from_root(Path::new(kind.dir_name())))
    }
}

/// Result of a physical move
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Moved {
    /// The file now lives at `path` in `stage`
    To { path: PathBuf, stage: Stage },
    /// The source was gone: another worker moved it first
    Vanished,
}

/// Performs lifecycle moves for one artifact kind
#[derive(Debug, Clone)]
pub struct Lifecycle {
    dirs: DirectorySet,
    hash_extension: String,
    backup: bool,
}

impl Lifecycle {
    pub fn new(dirs: DirectorySet, hash_extension: &str, backup: bool) -> Self {
        Self {
            dirs,
            hash_extension: hash_extension.to_string(),
            backup,
        }
    }

    pub fn dirs(&self) -> &DirectorySet {
        &self.dirs
    }

    /// Create the stage directory if absent
    pub fn ensure_dir(&self, stage: Stage) -> Result<&Path, ImportError> {
        let dir = self.dirs.path(stage);
        fs::create_dir_all(dir)?;
        Ok(dir)
    }

    /// Files waiting in a stage
    pub fn pending(&self, stage: Stage) -> Result<Vec<PathBuf>, ImportError> {
        Ok(pending_files(self.dirs.path(stage), &self.hash_extension)?)
    }

    /// Stages (backup excluded) holding a file named `name`
    pub fn locate(&self, name: &str) -> Vec<Stage> {
        Stage::ALL
            .iter()
            .copied()
            .filter(|s| *s != Stage::Backup && self.dirs.path(*s).join(name).is_file())
            .collect()
    }

    /// Move `file` from `stage` along the edge for `event`
    ///
    /// The result artifact is written next to the moved file when `outcome`
    /// is given, and the companion hash file follows the primary file.
    ///
    /// # Errors
    ///
    /// `FileMove` when there is no such edge or a rename fails. When the
    /// primary rename fails the file is left where it was. When only the
    /// companion rename fails the primary file has already moved and the
    /// error names the companion, which stays behind in `stage`.
    pub fn advance(
        &self,
        file: &Path,
        stage: Stage,
        event: Event,
        outcome: Option<&ImportOutcome>,
    ) -> Result<Moved, ImportError> {
        let next = transition(stage, event).ok_or_else(|| ImportError::FileMove {
            from: file.display().to_string(),
            to: String::new(),
            message: format!("no transition from {} on {:?}", stage, event),
        })?;

        if !file.exists() {
            log::info!("{} vanished from {}, skipping", file.display(), stage);
            return Ok(Moved::Vanished);
        }

        if self.backup && stage == Stage::From {
            self.backup_copy(file)?;
        }

        let dir = self.ensure_dir(next)?.to_path_buf();
        let dest = unique_destination(&dir, file);

        match fs::rename(file, &dest) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("{} claimed by another worker", file.display());
                return Ok(Moved::Vanished);
            }
            Err(e) => {
                log::error!("Failed to move {} to {}: {}", file.display(), dest.display(), e);
                return Err(move_error(file, &dest, e));
            }
        }

        let companion = companion_path(file, &self.hash_extension);
        if companion.is_file() {
            let companion_dest = companion_path(&dest, &self.hash_extension);
            fs::rename(&companion, &companion_dest).map_err(|e| {
                log::error!(
                    "Moved {} but not its hash file {}: {}",
                    dest.display(),
                    companion.display(),
                    e
                );
                move_error(&companion, &companion_dest, e)
            })?;
        }

        if let Some(outcome) = outcome {
            let mut artifact = fs::File::create(result_path(&dest))?;
            write_outcome_csv(outcome, &mut artifact)?;
        }

        log::info!("{} moved {} -> {}", dest.display(), stage, next);
        Ok(Moved::To {
            path: dest,
            stage: next,
        })
    }

    fn backup_copy(&self, file: &Path) -> Result<(), ImportError> {
        let dir = self.ensure_dir(Stage::Backup)?.to_path_buf();
        let dest = unique_destination(&dir, file);
        fs::copy(file, &dest)?;
        log::debug!("Backed up {} to {}", file.display(), dest.display());
        Ok(())
    }
}

fn move_error(from: &Path, to: &Path, e: io::Error) -> ImportError {
    ImportError::FileMove {
        from: from.display().to_string(),
        to: to.display().to_string(),
        message: e.to_string(),
    }
}

/// Destination in `dir` for `file` that does not overwrite an earlier file
fn unique_destination(dir: &Path, file: &Path) -> PathBuf {
    let name = file.file_name().unwrap_or_default().to_os_string();
    let candidate = dir.join(&name);
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| {
            let mut numbered = name.clone();
            numbered.push(format!(".{}", n));
            dir.join(numbered)
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
