//! Update Scheduler
//!
//! The scheduler coalesces updates. Effects whose scheduler queues a job do
//! not re-run when their dependencies change; they land in a pending queue
//! and run once at the next flush, however many times they were triggered.
//!
//! # Algorithm
//!
//! 1. `queue_job` appends a job unless the same job (by identity) is already
//!    pending
//! 2. Inside [`run_local`], the first job queued while no flush is pending
//!    spawns a local task that yields once and then flushes. Outside it the
//!    host drives the flush, synchronously with [`flush_jobs`] or deferred
//!    with [`next_tick`]
//! 3. A flush snapshots the queue, clears it, then runs the snapshot in
//!    enqueue order
//! 4. Jobs queued while the snapshot runs wait for the next flush
//!
//! A job that panics is caught and logged; the remaining jobs still run and
//! the first failure is reported once the flush is done.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};

/// Flush rounds [`next_tick`] allows before giving up on a queue that keeps
/// refilling itself.
pub const DEFAULT_FLUSH_LIMIT: usize = 100;

/// A unit of deferred work, deduplicated by identity.
///
/// Clones share identity: queueing two clones of one job runs it once.
#[derive(Clone)]
pub struct Job(Rc<dyn Fn()>);

impl Job {
    /// Wrap a callback as a job.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self(Rc::new(run))
    }

    /// Run the job now.
    pub fn run(&self) {
        (self.0)();
    }

    /// Whether two handles are the same job.
    pub fn same(&self, other: &Job) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Job")
            .field(&Rc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

#[derive(Default)]
struct JobQueue {
    jobs: Vec<Job>,
    flush_pending: bool,
}

thread_local! {
    static QUEUE: RefCell<JobQueue> = RefCell::new(JobQueue::default());
    /// Nesting depth of [`run_local`] on this thread.
    static LOCAL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Queue `job` for the next flush unless it is already pending.
///
/// Inside [`run_local`] this also schedules the deferred flush.
pub fn queue_job(job: Job) {
    let schedule = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        if !queue.jobs.iter().any(|pending| pending.same(&job)) {
            queue.jobs.push(job);
        }
        if queue.flush_pending {
            return false;
        }
        if LOCAL_DEPTH.with(Cell::get) == 0 {
            debug!("no local task set, flush is host-driven");
            return false;
        }
        queue.flush_pending = true;
        true
    });

    if schedule {
        trace!("flush scheduled");
        tokio::task::spawn_local(async {
            tokio::task::yield_now().await;
            if let Err(err) = flush_until_idle(DEFAULT_FLUSH_LIMIT) {
                warn!(%err, "deferred flush failed");
            }
        });
    }
}

/// Run `future` on a fresh [`LocalSet`](tokio::task::LocalSet) with deferred
/// flushing enabled: queued jobs run on their own after the current task
/// yields.
///
/// Must be awaited from within a tokio runtime.
pub async fn run_local<F: Future>(future: F) -> F::Output {
    let _guard = LocalGuard::enter();
    tokio::task::LocalSet::new().run_until(future).await
}

struct LocalGuard;

impl LocalGuard {
    fn enter() -> Self {
        LOCAL_DEPTH.with(|depth| depth.set(depth.get() + 1));
        LocalGuard
    }
}

impl Drop for LocalGuard {
    fn drop(&mut self) {
        let left = LOCAL_DEPTH.with(|depth| {
            let left = depth.get().saturating_sub(1);
            depth.set(left);
            left
        });
        if left == 0 {
            // A spawned flush dies with its task set.
            QUEUE.with(|queue| queue.borrow_mut().flush_pending = false);
        }
    }
}

/// Remove `job` from the pending queue. Returns whether it was pending.
pub fn invalidate_job(job: &Job) -> bool {
    let removed = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        let position = queue.jobs.iter().position(|pending| pending.same(job));
        position.map(|index| queue.jobs.remove(index))
    });
    removed.is_some()
}

/// Whether any job is waiting for a flush.
pub fn has_pending_jobs() -> bool {
    QUEUE.with(|queue| !queue.borrow().jobs.is_empty())
}

/// Number of jobs waiting for a flush.
pub fn pending_jobs() -> usize {
    QUEUE.with(|queue| queue.borrow().jobs.len())
}

/// Run every job pending right now, in enqueue order.
///
/// Returns how many jobs ran. Jobs queued during the flush are left for the
/// next one.
pub fn flush_jobs() -> Result<usize> {
    let snapshot = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        queue.flush_pending = false;
        std::mem::take(&mut queue.jobs)
    });

    if snapshot.is_empty() {
        return Ok(0);
    }

    debug!(jobs = snapshot.len(), "flushing job queue");

    let mut first_failure = None;
    for job in &snapshot {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job.run())) {
            let message = panic_message(payload.as_ref());
            error!(%message, "job panicked during flush");
            first_failure.get_or_insert(Error::JobPanicked { message });
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(snapshot.len()),
    }
}

/// Flush repeatedly until no job is pending.
///
/// Fails with [`Error::FlushLimitExceeded`] if the queue is still not empty
/// after `limit` rounds. A panicking job does not stop the rounds; the first
/// failure is returned at the end.
pub fn flush_until_idle(limit: usize) -> Result<usize> {
    let mut total = 0;
    let mut first_failure = None;

    for _ in 0..limit {
        if !has_pending_jobs() {
            break;
        }
        match flush_jobs() {
            Ok(ran) => total += ran,
            Err(err) => {
                first_failure.get_or_insert(err);
            }
        }
    }

    if has_pending_jobs() {
        return Err(Error::FlushLimitExceeded { limit });
    }
    match first_failure {
        Some(err) => Err(err),
        None => Ok(total),
    }
}

/// Deferred flush: yield to the runtime once, then drain the queue.
///
/// Anything else scheduled on the current task set gets to run (and queue
/// more jobs) before the flush, which is what lets synchronous bursts of
/// writes coalesce into one update.
pub async fn next_tick() -> Result<usize> {
    tokio::task::yield_now().await;
    flush_until_idle(DEFAULT_FLUSH_LIMIT)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn duplicate_jobs_run_once() {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let job = Job::new(move || r.set(r.get() + 1));

        queue_job(job.clone());
        queue_job(job.clone());
        assert_eq!(pending_jobs(), 1);

        assert_eq!(flush_jobs(), Ok(1));
        assert_eq!(runs.get(), 1);
        assert!(!has_pending_jobs());
    }

    #[test]
    fn jobs_run_in_enqueue_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["a", "b", "c"] {
            let l = log.clone();
            queue_job(Job::new(move || l.borrow_mut().push(name)));
        }
        flush_jobs().unwrap();
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn jobs_queued_during_flush_wait_for_next_flush() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        let late = Job::new(move || l.borrow_mut().push("late"));

        let l = log.clone();
        queue_job(Job::new(move || {
            l.borrow_mut().push("early");
            queue_job(late.clone());
        }));

        assert_eq!(flush_jobs(), Ok(1));
        assert_eq!(*log.borrow(), vec!["early"]);
        assert!(has_pending_jobs());

        assert_eq!(flush_jobs(), Ok(1));
        assert_eq!(*log.borrow(), vec!["early", "late"]);
    }

    #[test]
    fn panicking_job_does_not_abort_the_flush() {
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();

        queue_job(Job::new(|| panic!("boom")));
        queue_job(Job::new(move || r.set(true)));

        let result = flush_jobs();
        assert_eq!(
            result,
            Err(Error::JobPanicked {
                message: "boom".to_string()
            })
        );
        assert!(ran.get());
    }

    #[test]
    fn invalidated_job_does_not_run() {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let job = Job::new(move || r.set(r.get() + 1));

        queue_job(job.clone());
        assert!(invalidate_job(&job));
        assert!(!invalidate_job(&job));

        assert_eq!(flush_jobs(), Ok(0));
        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn self_requeueing_job_hits_the_flush_limit() {
        let slot: Rc<RefCell<Option<Job>>> = Rc::new(RefCell::new(None));
        let s = slot.clone();
        let job = Job::new(move || {
            if let Some(job) = s.borrow().clone() {
                queue_job(job);
            }
        });
        *slot.borrow_mut() = Some(job.clone());

        queue_job(job);
        assert_eq!(
            flush_until_idle(5),
            Err(Error::FlushLimitExceeded { limit: 5 })
        );

        slot.borrow_mut().take();
        assert_eq!(flush_until_idle(5), Ok(1));
    }

    #[tokio::test]
    async fn next_tick_drains_the_queue() {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let job = Job::new(move || r.set(r.get() + 1));

        queue_job(job.clone());
        queue_job(job);
        assert_eq!(runs.get(), 0);

        assert_eq!(next_tick().await, Ok(1));
        assert_eq!(runs.get(), 1);
    }

    #[tokio::test]
    async fn local_task_set_flushes_without_host_help() {
        run_local(async {
            let runs = Rc::new(Cell::new(0));
            let r = runs.clone();
            let job = Job::new(move || r.set(r.get() + 1));

            queue_job(job.clone());
            queue_job(job);
            assert_eq!(runs.get(), 0);

            for _ in 0..10 {
                if runs.get() > 0 {
                    break;
                }
                tokio::task::yield_now().await;
            }
            assert_eq!(runs.get(), 1);
            assert!(!has_pending_jobs());
        })
        .await;
    }

    #[tokio::test]
    async fn without_a_local_task_set_jobs_wait_for_the_host() {
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        queue_job(Job::new(move || r.set(true)));

        tokio::task::yield_now().await;
        assert!(!ran.get());
        assert_eq!(pending_jobs(), 1);

        assert_eq!(flush_jobs(), Ok(1));
        assert!(ran.get());
    }
}
