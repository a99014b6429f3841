//! Directory tree encryption and decryption.
//!
//! A tree operation runs in three phases:
//!
//! 1. **Plan** (sequential): walk the source, translate every directory name once and
//!    every file name, and reject any destination that already exists. Nothing is
//!    written during planning.
//! 2. **Execute** (parallel): each file is an independent job on a rayon pool. Jobs
//!    create their parent directories on demand and write through a temp file.
//! 3. **Remove** (after all jobs joined): the source is deleted only if every job
//!    succeeded and `preserve` is off.
//!
//! Failure policy is collect-and-report: every job runs, failed jobs leave no output,
//! finished jobs stay in place, and the caller gets one `CellarError::Tree` listing all
//! failures. The source is never removed in that case.
//!
//! The walk is file-driven, so directories without files are not reproduced.

use std::collections::{HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::crypto::ChunkCodec;
use crate::file::{decrypt_file_to, encrypt_file_to};
use crate::names::{deobfuscate_os, is_obfuscated, obfuscate_os};
use crate::types::{CellarError, CellarOptions, StreamStats, TreeFailures, TreeReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    /// Entries this direction leaves alone.
    fn skips(self, name: &OsStr) -> bool {
        match self {
            Direction::Encrypt => is_obfuscated(name),
            Direction::Decrypt => !is_obfuscated(name),
        }
    }

    fn rename(self, codec: &ChunkCodec, name: &OsStr) -> Result<OsString, CellarError> {
        match self {
            Direction::Encrypt => obfuscate_os(codec, name),
            Direction::Decrypt => deobfuscate_os(codec, name),
        }
    }
}

#[derive(Debug)]
struct Job {
    src: PathBuf,
    dest: PathBuf,
}

#[derive(Debug)]
struct Plan {
    dest_root: PathBuf,
    jobs: Vec<Job>,
    skipped: Vec<PathBuf>,
}

/// Resolve `root` to a path with a final name component (`.` and `..` have none).
fn named_root(root: &Path) -> Result<PathBuf, CellarError> {
    if !root.is_dir() {
        return Err(CellarError::Usage("tree operations need a directory"));
    }
    if root.file_name().is_some() {
        Ok(root.to_path_buf())
    } else {
        Ok(fs::canonicalize(root)?)
    }
}

/// Walk `root` and map every file to its destination. Nothing is written.
///
/// Name errors (bad tokens, names too long once sealed) and collisions abort here.
fn plan(
    codec: &ChunkCodec,
    root: &Path,
    direction: Direction,
    check_collisions: bool,
) -> Result<Plan, CellarError> {
    let root_name = root
        .file_name()
        .ok_or(CellarError::Usage("directory has no name"))?;
    match direction {
        Direction::Encrypt if is_obfuscated(root_name) => {
            return Err(CellarError::Usage("directory is already encrypted"));
        }
        Direction::Decrypt if !is_obfuscated(root_name) => {
            return Err(CellarError::InvalidName(
                root_name.to_string_lossy().into_owned(),
            ));
        }
        _ => {}
    }
    let parent = root.parent().unwrap_or_else(|| Path::new("."));
    let dest_root = parent.join(direction.rename(codec, root_name)?);

    // Relative source directory -> destination directory. Each directory is renamed
    // once so that sibling files share one destination parent.
    let mut dirs: HashMap<PathBuf, PathBuf> = HashMap::new();
    dirs.insert(PathBuf::new(), dest_root.clone());
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut jobs = Vec::new();
    let mut skipped = Vec::new();

    let mut walk = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walk.next() {
        let entry = entry.map_err(io::Error::from)?;
        let file_type = entry.file_type();

        if direction.skips(entry.file_name()) {
            if file_type.is_dir() {
                walk.skip_current_dir();
            }
            skipped.push(entry.path().to_path_buf());
            continue;
        }
        if !file_type.is_dir() && !file_type.is_file() {
            skipped.push(entry.path().to_path_buf());
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| CellarError::Usage("walk left the source directory"))?;
        let rel_parent = rel.parent().unwrap_or_else(|| Path::new(""));
        let dest_parent = dirs
            .get(rel_parent)
            .ok_or(CellarError::Usage("walk visited a file before its directory"))?;
        let dest = dest_parent.join(direction.rename(codec, entry.file_name())?);

        if file_type.is_dir() {
            dirs.insert(rel.to_path_buf(), dest);
            continue;
        }

        if check_collisions && (dest.symlink_metadata().is_ok() || !seen.insert(dest.clone())) {
            return Err(CellarError::Collision(dest));
        }
        jobs.push(Job {
            src: entry.into_path(),
            dest,
        });
    }

    Ok(Plan {
        dest_root,
        jobs,
        skipped,
    })
}

fn build_pool(jobs: Option<usize>) -> Result<rayon::ThreadPool, CellarError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.unwrap_or(0))
        .thread_name(|i| format!("cellar-worker-{i}"))
        .build()
        .map_err(|e| CellarError::Io(io::Error::other(e.to_string())))
}

fn run_job(
    codec: &ChunkCodec,
    block_size: usize,
    direction: Direction,
    job: &Job,
) -> Result<StreamStats, CellarError> {
    let stats = match direction {
        Direction::Encrypt => encrypt_file_to(codec, block_size, &job.src, &job.dest)?,
        Direction::Decrypt => decrypt_file_to(codec, block_size, &job.src, &job.dest)?,
    };
    debug!(
        src = %job.src.display(),
        dest = %job.dest.display(),
        cipher = %codec.cipher(),
        chunks = stats.chunks,
        "{direction:?}ed file"
    );
    Ok(stats)
}

/// Delete the source once every job has succeeded.
///
/// Skipped entries were not copied anywhere, so when there are any only the transformed
/// files (and directories left empty by their removal) are deleted. Returns whether the
/// whole source root is gone.
fn remove_source(root: &Path, plan: &Plan) -> Result<bool, CellarError> {
    if plan.skipped.is_empty() {
        fs::remove_dir_all(root)?;
        return Ok(true);
    }
    for job in &plan.jobs {
        fs::remove_file(&job.src)?;
    }
    for entry in WalkDir::new(root).contents_first(true).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() {
            // Non-empty directories still hold skipped entries.
            let _ = fs::remove_dir(entry.path());
        }
    }
    Ok(!root.exists())
}

fn transform(
    codec: &ChunkCodec,
    opts: &CellarOptions,
    root: &Path,
    direction: Direction,
) -> Result<TreeReport, CellarError> {
    let root = named_root(root)?;
    let plan = plan(codec, &root, direction, true)?;
    for path in &plan.skipped {
        debug!(path = %path.display(), "skipped");
    }

    let pool = build_pool(opts.jobs)?;
    let results: Vec<Result<StreamStats, CellarError>> = pool.install(|| {
        plan.jobs
            .par_iter()
            .map(|job| run_job(codec, opts.block_size, direction, job))
            .collect()
    });

    // Every job has been joined at this point.
    let failures: Vec<(PathBuf, CellarError)> = plan
        .jobs
        .iter()
        .zip(results)
        .filter_map(|(job, res)| res.err().map(|e| (job.src.clone(), e)))
        .collect();
    if !failures.is_empty() {
        warn!(
            root = %root.display(),
            failed = failures.len(),
            total = plan.jobs.len(),
            "tree {direction:?} incomplete, source kept"
        );
        return Err(CellarError::Tree(TreeFailures { failures }));
    }

    let removed_source = !opts.preserve && remove_source(&root, &plan)?;
    info!(
        src = %root.display(),
        dest = %plan.dest_root.display(),
        files = plan.jobs.len(),
        skipped = plan.skipped.len(),
        "{direction:?}ed directory"
    );
    Ok(TreeReport {
        root: plan.dest_root,
        files: plan.jobs.len(),
        skipped: plan.skipped,
        removed_source,
    })
}

/// Encrypt every file under `root` into an obfuscated sibling tree.
pub fn encrypt_dir(
    codec: &ChunkCodec,
    opts: &CellarOptions,
    root: &Path,
) -> Result<TreeReport, CellarError> {
    transform(codec, opts, root, Direction::Encrypt)
}

/// Decrypt an obfuscated tree back into a sibling tree with the original names.
pub fn decrypt_dir(
    codec: &ChunkCodec,
    opts: &CellarOptions,
    root: &Path,
) -> Result<TreeReport, CellarError> {
    transform(codec, opts, root, Direction::Decrypt)
}

/// Original relative paths of every file in an obfuscated tree, rooted at the original
/// root name. Content is not read.
pub fn list_dir(codec: &ChunkCodec, root: &Path) -> Result<Vec<PathBuf>, CellarError> {
    let root = named_root(root)?;
    let plan = plan(codec, &root, Direction::Decrypt, false)?;
    let base = plan
        .dest_root
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok(plan
        .jobs
        .into_iter()
        .map(|job| {
            job.dest
                .strip_prefix(&base)
                .map(Path::to_path_buf)
                .unwrap_or(job.dest)
        })
        .collect())
}
