//! Planning job orchestration.
//!
//! Every job runs one exploration on a dedicated thread. Jobs are polled with
//! [`Planner::status`], cancelled with [`Planner::abort`] and collected with
//! [`Planner::fetch`], which also splices the result into the movable's
//! movement history.

use crate::collision::CollisionOracle;
use crate::config::PlannerConfig;
use crate::configuration::Configuration;
use crate::dump;
use crate::error::{PlannerError, Result};
use crate::explorer::{Exploration, Explorer};
use crate::sampler::WorkerPool;
use crate::world::World;
use crate::world_tree::WorldTree;
use log::{debug, error, info};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId(pub u32);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    NotFound,
    Running,
    Finished,
}

impl JobStatus {
    pub fn exists(&self) -> bool {
        !matches!(self, JobStatus::NotFound)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Finished)
    }
}

/// Result of a fetched job.
#[derive(Clone, Debug)]
pub struct FetchedPath {
    /// Index of the candidate that was reached exactly, for jobs submitted
    /// with [`Planner::submit_towards`].
    pub matched_index: Option<usize>,
    pub exploration: Exploration,
    /// New position node of the movement history, if the result was spliced in.
    pub joined: Option<usize>,
}

impl FetchedPath {
    pub fn path(&self) -> &[Configuration] {
        self.exploration.path()
    }
}

struct Job {
    movable: usize,
    // The object the job planned for, even if its slot has since been reused.
    explorer: Arc<Explorer>,
    world_tree: Arc<WorldTree>,
    target_index: Option<usize>,
    token: Arc<AtomicBool>,
    handle: JoinHandle<Exploration>,
}

pub struct Planner {
    config: Arc<PlannerConfig>,
    world: Arc<World>,
    jobs: Mutex<HashMap<JobId, Job>>,
    next_job: AtomicU32,
}

impl Planner {
    /// Builds the worker pool and an empty world.
    pub fn new(config: PlannerConfig) -> Result<Self> {
        let config = Arc::new(config);
        let pool = Arc::new(WorkerPool::new(config.workers.threads, config.workers.seed)?);
        info!("planner started with {} workers", pool.threads());
        Ok(Self {
            world: Arc::new(World::new(config.clone(), pool)),
            config,
            jobs: Mutex::new(HashMap::new()),
            next_job: AtomicU32::new(0),
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// Number of jobs not yet fetched or aborted.
    pub fn job_count(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Starts a search from `root` to `target`, cancelling any search still
    /// running for the same movable.
    pub fn submit(
        &self,
        movable: usize,
        root: Configuration,
        target: Configuration,
        exact: bool,
    ) -> Result<JobId> {
        self.spawn(movable, root, target, exact, None)
    }

    /// Starts a search towards the first usable candidate.
    ///
    /// The target is the candidate that completes a run of
    /// `jobs.min_matchee_section` consecutive collision-free candidates and is
    /// matched exactly. Without such a run, the search heads for the last
    /// candidate without exact matching.
    pub fn submit_towards(
        &self,
        movable: usize,
        root: Configuration,
        candidates: &[Configuration],
    ) -> Result<JobId> {
        let Some(last) = candidates.last() else {
            return Err(PlannerError::EmptyCandidates);
        };
        self.world.explorer(movable)?;

        let section = self.config.jobs.min_matchee_section.max(1);
        let mut free_run = 0;
        let mut matched = None;
        for (i, candidate) in candidates.iter().enumerate() {
            if self.world.collides(movable, candidate) {
                free_run = 0;
            } else {
                free_run += 1;
                if free_run == section {
                    matched = Some(i);
                    break;
                }
            }
        }

        match matched {
            Some(i) => self.spawn(movable, root, candidates[i], true, Some(i)),
            None => self.spawn(movable, root, *last, false, None),
        }
    }

    fn spawn(
        &self,
        movable: usize,
        root: Configuration,
        target: Configuration,
        exact: bool,
        target_index: Option<usize>,
    ) -> Result<JobId> {
        let explorer = self.world.explorer(movable)?;
        let world_tree = self.world.world_tree(movable)?;
        let world = self.world.clone();
        let token = Arc::new(AtomicBool::new(false));
        let job_token = token.clone();
        let id = JobId(self.next_job.fetch_add(1, Ordering::Relaxed));

        // Preempt on the submitting thread so submission order decides which run survives.
        let epoch = explorer.preempt();
        let job_explorer = explorer.clone();
        let handle = thread::Builder::new()
            .name(format!("estplan-job-{}", id.0))
            .spawn(move || {
                job_explorer.explore_in_epoch(&*world, &root, &target, exact, &job_token, epoch)
            })?;

        self.jobs.lock().insert(
            id,
            Job {
                movable,
                explorer,
                world_tree,
                target_index,
                token,
                handle,
            },
        );
        debug!("job {} submitted for movable {}", id, movable);
        Ok(id)
    }

    /// Never blocks.
    pub fn status(&self, id: JobId) -> JobStatus {
        match self.jobs.lock().get(&id) {
            Some(job) if job.handle.is_finished() => JobStatus::Finished,
            Some(_) => JobStatus::Running,
            None => JobStatus::NotFound,
        }
    }

    /// Cancels a job and forgets it after the abort grace period.
    ///
    /// Returns `false` if the job does not exist.
    pub fn abort(&self, id: JobId) -> bool {
        let token = match self.jobs.lock().get(&id) {
            Some(job) => job.token.clone(),
            None => return false,
        };
        token.store(true, Ordering::Release);
        thread::sleep(self.config.jobs.abort_grace());
        self.jobs.lock().remove(&id);
        debug!("job {} aborted", id);
        true
    }

    /// Waits for a job, removes it and splices its result into the movable's
    /// movement history. A failed splice is logged and reported through
    /// [`FetchedPath::joined`].
    pub fn fetch(&self, id: JobId) -> Result<FetchedPath> {
        let job = self
            .jobs
            .lock()
            .remove(&id)
            .ok_or(PlannerError::UnknownJob(id))?;
        let Job {
            movable,
            explorer,
            world_tree,
            target_index,
            handle,
            ..
        } = job;
        let exploration = handle
            .join()
            .map_err(|_| PlannerError::JobPanicked(id))?;

        let joined = match exploration.solution() {
            Some(solution) => match self.join(movable, &explorer, &world_tree, solution.run) {
                Ok(position) => Some(position),
                Err(e) => {
                    error!("job {}: unable to join exploration: {}", id, e);
                    None
                }
            },
            None => None,
        };

        Ok(FetchedPath {
            matched_index: target_index.filter(|_| exploration.is_solved()),
            exploration,
            joined,
        })
    }

    fn join(
        &self,
        movable: usize,
        explorer: &Arc<Explorer>,
        world_tree: &WorldTree,
        run: u64,
    ) -> Result<usize> {
        let current = self.world.explorer(movable)?;
        if !Arc::ptr_eq(&current, explorer) {
            return Err(PlannerError::UnknownMovable(movable));
        }
        world_tree.join(explorer, run)
    }

    /// Records a realised move of `movable`.
    pub fn move_object(
        &self,
        movable: usize,
        start: &Configuration,
        end: &Configuration,
    ) -> Result<usize> {
        self.world.world_tree(movable)?.move_from_to_insert(start, end)
    }

    /// Writes the movement history of `movable` as JSON.
    pub fn dump_world_tree(&self, movable: usize, path: impl AsRef<Path>) -> Result<()> {
        let snapshot = self.world.world_tree(movable)?.snapshot();
        dump::write_json(path.as_ref(), &snapshot)
    }

    /// Cancels all jobs and removes every object.
    pub fn clear(&self) {
        let jobs: Vec<Job> = self.jobs.lock().drain().map(|(_, job)| job).collect();
        for job in &jobs {
            job.token.store(true, Ordering::Release);
        }
        self.world.clear();
        debug!("planner cleared, {} jobs cancelled", jobs.len());
    }
}

impl Drop for Planner {
    fn drop(&mut self) {
        for job in self.jobs.get_mut().values() {
            job.token.store(true, Ordering::Release);
        }
    }
}
