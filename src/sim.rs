/// External simulation subprocess driver.
///
/// The simulation is a black box with a contract: it is invoked with a base
/// input deck and optionally a per-run edits file, writes its result files
/// to the paths named in the deck, and its combined stdout/stderr is
/// captured to `<infile>.stdout` for post-mortems. A non-zero exit status
/// is fatal for that run (or that ensemble member).
///
/// Ensemble batches run several simulations concurrently up to a configured
/// limit. Each job writes disjoint output files, so no synchronization is
/// needed beyond a coarse poll loop over the process handles; a member's
/// results are only read after its handle reports completion.

use chrono::Local;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use crate::logging::Logger;
use crate::model::SimError;

// ---------------------------------------------------------------------------
// Job records
// ---------------------------------------------------------------------------

/// One simulation run in a batch.
#[derive(Debug, Clone)]
pub struct Job {
    /// Display name, e.g. "bloomcast_8081".
    pub name: String,
    pub infile: PathBuf,
    pub edits: Option<PathBuf>,
}

/// Lifecycle of a batch job. Kept per job after the batch finishes so
/// post-mortem diagnostics stay available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running { pid: u32 },
    Completed { exit_code: i32 },
}

#[derive(Debug)]
pub struct JobRecord {
    pub job: Job,
    pub state: JobState,
}

impl JobRecord {
    pub fn succeeded(&self) -> bool {
        matches!(self.state, JobState::Completed { exit_code: 0 })
    }
}

// ---------------------------------------------------------------------------
// Launching
// ---------------------------------------------------------------------------

fn capture_path(infile: &Path) -> PathBuf {
    let mut path = infile.as_os_str().to_os_string();
    path.push(".stdout");
    PathBuf::from(path)
}

fn spawn_run(executable: &Path, infile: &Path, edits: Option<&Path>) -> Result<Child, SimError> {
    // Concurrent ensemble members share the base infile; the per-member
    // edits file is the unique name to hang the capture file on.
    let capture_file_path = capture_path(edits.unwrap_or(infile));
    let capture = File::create(&capture_file_path).map_err(|e| SimError::CaptureFailed {
        path: capture_file_path.display().to_string(),
        detail: e.to_string(),
    })?;
    let capture_err = capture.try_clone().map_err(|e| SimError::CaptureFailed {
        path: capture_file_path.display().to_string(),
        detail: e.to_string(),
    })?;
    let mut command = Command::new(executable);
    command.arg("run").arg(infile);
    if let Some(edits) = edits {
        command.arg("--edits").arg(edits);
    }
    command
        .stdin(Stdio::null())
        .stdout(Stdio::from(capture))
        .stderr(Stdio::from(capture_err))
        .spawn()
        .map_err(|e| SimError::LaunchFailed {
            executable: executable.display().to_string(),
            detail: e.to_string(),
        })
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    // A signal-terminated child has no code; report it as failure.
    status.code().unwrap_or(-1)
}

/// Run one simulation synchronously, blocking until it exits.
pub fn run_simulation(
    executable: &Path,
    infile: &Path,
    edits: Option<&Path>,
    logger: &Logger,
) -> Result<(), SimError> {
    logger.info(
        "sim",
        &format!(
            "simulation run with {} started at {}",
            infile.display(),
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ),
    );
    let mut child = spawn_run(executable, infile, edits)?;
    let status = child.wait().map_err(|e| SimError::LaunchFailed {
        executable: executable.display().to_string(),
        detail: e.to_string(),
    })?;
    if !status.success() {
        return Err(SimError::NonZeroExit {
            infile: infile.display().to_string(),
            status: exit_code(status),
        });
    }
    logger.info(
        "sim",
        &format!(
            "simulation run with {} finished at {}",
            infile.display(),
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Batch runner
// ---------------------------------------------------------------------------

/// Run a batch of simulations with at most `max_concurrent` running at
/// once, polling the active handles every `poll_interval`.
///
/// Individual job failures do not abort the batch; each job's final state
/// is reported in its record and the caller decides how to treat non-zero
/// exits. There are no per-job timeouts: a hung simulation occupies its
/// slot until externally terminated.
pub fn run_batch(
    jobs: Vec<Job>,
    executable: &Path,
    max_concurrent: usize,
    poll_interval: Duration,
    logger: &Logger,
) -> Result<Vec<JobRecord>, SimError> {
    let mut records: Vec<JobRecord> = jobs
        .into_iter()
        .map(|job| JobRecord {
            job,
            state: JobState::Pending,
        })
        .collect();
    let mut active: Vec<(usize, Child)> = Vec::new();
    let mut next_job = 0usize;

    loop {
        while active.len() < max_concurrent && next_job < records.len() {
            let record = &mut records[next_job];
            let child = spawn_run(
                executable,
                &record.job.infile,
                record.job.edits.as_deref(),
            )?;
            record.state = JobState::Running { pid: child.id() };
            logger.info(
                "sim",
                &format!(
                    "{} started at {}",
                    record.job.name,
                    Local::now().format("%Y-%m-%d %H:%M:%S")
                ),
            );
            active.push((next_job, child));
            next_job += 1;
        }

        let mut still_active = Vec::with_capacity(active.len());
        for (index, mut child) in active {
            match child.try_wait() {
                Ok(Some(status)) => {
                    records[index].state = JobState::Completed {
                        exit_code: exit_code(status),
                    };
                    logger.info(
                        "sim",
                        &format!(
                            "{} finished at {}",
                            records[index].job.name,
                            Local::now().format("%Y-%m-%d %H:%M:%S")
                        ),
                    );
                }
                Ok(None) => still_active.push((index, child)),
                Err(e) => {
                    logger.error(
                        "sim",
                        &format!("lost track of {}: {}", records[index].job.name, e),
                    );
                    records[index].state = JobState::Completed { exit_code: -1 };
                }
            }
        }
        active = still_active;

        if active.is_empty() && next_job >= records.len() {
            break;
        }
        std::thread::sleep(poll_interval);
    }

    Ok(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
