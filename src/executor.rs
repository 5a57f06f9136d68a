//! Dependency aware worker pool
//!
//! A fixed number of threads pull ready jobs from a shared channel and send
//! results back. The calling thread supervises: it owns the pending jobs,
//! strips finished paths from their dependency sets and keeps the ready
//! channel topped up to the worker count.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use std::thread;
use tracing::debug;
use vcsgrip_core::domain::{
    CommandOutput, Job, JobAction, JobResult, OperationKind, RepoHandle, ReturnCode,
};
use vcsgrip_core::ports::invocation_label;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorOptions {
    pub workers: usize,
    /// Print one glyph per finished job when more than one job runs
    pub show_progress: bool,
    /// Put every progress glyph on its own line so it interleaves with logs
    pub debug: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            show_progress: false,
            debug: false,
        }
    }
}

/// Run all jobs and return exactly one result per job, in completion order
pub fn execute_jobs(
    jobs: Vec<Job>,
    options: &ExecutorOptions,
    progress: &mut dyn Write,
) -> Vec<JobResult> {
    let total = jobs.len();
    if total == 0 {
        return Vec::new();
    }
    let worker_count = options.workers.clamp(1, total);
    let show_progress = options.show_progress && total > 1;
    install_panic_location_hook();

    let (job_tx, job_rx) = unbounded::<Job>();
    let (result_tx, result_rx) = unbounded::<JobResult>();

    thread::scope(|scope| {
        for _ in 0..worker_count {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            scope.spawn(move || worker(jobs, results));
        }
        drop(job_rx);
        drop(result_tx);

        let mut supervisor = Supervisor {
            pending: jobs,
            running: Vec::new(),
            job_tx,
            worker_count,
        };
        supervisor.dispatch_ready();
        debug!("ongoing {:?}", supervisor.running_paths());

        let mut results = Vec::with_capacity(total);
        while results.len() < total {
            if supervisor.running.is_empty() {
                // nothing in flight can unblock the remaining jobs
                results.extend(supervisor.pending.drain(..).map(unresolved_dependencies));
                break;
            }
            let Ok(result) = result_rx.recv() else {
                results.extend(supervisor.running.drain(..).map(lost_worker));
                results.extend(supervisor.pending.drain(..).map(unresolved_dependencies));
                break;
            };
            debug!("finished '{}'", result.path().display());
            supervisor.finish(&result.repo);

            if show_progress {
                let _ = write!(progress, "{}", progress_glyph(result.code()));
                if options.debug {
                    let _ = writeln!(progress);
                }
                let _ = progress.flush();
            }

            results.push(result);
            if !supervisor.running.is_empty() {
                debug!("ongoing {:?}", supervisor.running_paths());
            }
        }
        if show_progress && !options.debug {
            let _ = writeln!(progress);
        }

        // closing the job channel lets the workers exit before the scope joins them
        drop(supervisor);
        results
    })
}

struct Supervisor {
    pending: Vec<Job>,
    running: Vec<RepoHandle>,
    job_tx: Sender<Job>,
    worker_count: usize,
}

impl Supervisor {
    /// Queue ready jobs until every worker has one waiting
    fn dispatch_ready(&mut self) {
        while self.job_tx.len() < self.worker_count {
            let Some(index) = self.pending.iter().position(Job::is_ready) else {
                break;
            };
            let job = self.pending.remove(index);
            debug!("started '{}'", job.path().display());
            let repo = job.repo.clone();
            if self.job_tx.send(job).is_err() {
                break;
            }
            self.running.push(repo);
        }
    }

    fn finish(&mut self, repo: &RepoHandle) {
        if let Some(index) = self.running.iter().position(|r| r == repo) {
            self.running.remove(index);
        }
        for job in &mut self.pending {
            job.depends.remove(&repo.path);
        }
        self.dispatch_ready();
    }

    fn running_paths(&self) -> Vec<String> {
        self.running.iter().map(|r| r.path.display().to_string()).collect()
    }
}

fn worker(jobs: Receiver<Job>, results: Sender<JobResult>) {
    for job in jobs.iter() {
        if results.send(process_job(job)).is_err() {
            break;
        }
    }
}

/// Execute one job, containing any error or panic in its result
pub fn process_job(job: Job) -> JobResult {
    let Job { repo, action, .. } = job;
    match action {
        JobAction::Unsupported { message } => {
            let outcome = CommandOutput::failed(&repo.path, message);
            JobResult { repo, operation: None, outcome }
        }
        JobAction::Duplicate { of, operation } => {
            let outcome = CommandOutput::new(
                "",
                Some(repo.path.clone()),
                format!("Same repository as '{}'", of.display()),
                ReturnCode::Neutral,
            );
            JobResult { repo, operation: Some(operation), outcome }
        }
        JobAction::Run { client, operation } => {
            let kind = operation.kind();
            let label = invocation_label(client.kind(), kind);
            let outcome = if !client.supports(kind) {
                client.not_implemented(kind)
            } else {
                match catch_contained(|| client.run(&operation)) {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => invocation_failed(&repo, kind, label, format!("{e:#}")),
                    Err(payload) => {
                        let location = LAST_PANIC_LOCATION
                            .with(|cell| cell.borrow_mut().take())
                            .map(|location| format!(" ({location})"))
                            .unwrap_or_default();
                        let message = panic_message(payload.as_ref());
                        invocation_failed(&repo, kind, label, format!("panic: {message}{location}"))
                    }
                }
            };
            JobResult { repo, operation: Some(kind), outcome }
        }
    }
}

fn invocation_failed(
    repo: &RepoHandle,
    kind: OperationKind,
    label: String,
    detail: String,
) -> CommandOutput {
    CommandOutput::new(
        label,
        Some(repo.path.clone()),
        format!("Invocation of command '{kind}' on client '{}' failed: {detail}", repo.kind),
        ReturnCode::Failed(1),
    )
}

fn unresolved_dependencies(job: Job) -> JobResult {
    let waiting_on: Vec<String> = job.depends.iter().map(|p| p.display().to_string()).collect();
    let operation = job.operation_kind();
    let outcome = CommandOutput::failed(
        job.path(),
        format!("Dependencies never completed: {}", waiting_on.join(", ")),
    );
    JobResult { repo: job.repo, operation, outcome }
}

fn lost_worker(repo: RepoHandle) -> JobResult {
    let outcome = CommandOutput::failed(&repo.path, "Worker exited before reporting a result");
    JobResult { repo, operation: None, outcome }
}

/// Glyph printed for a finished job
pub fn progress_glyph(code: ReturnCode) -> char {
    match code {
        ReturnCode::NotApplicable => 's',
        ReturnCode::Failed(_) => 'E',
        ReturnCode::Success | ReturnCode::Neutral => '.',
    }
}

thread_local! {
    static LAST_PANIC_LOCATION: RefCell<Option<String>> = const { RefCell::new(None) };
    /// Set while a job's panic is caught and turned into a result
    static CONTAINING_PANIC: Cell<bool> = const { Cell::new(false) };
}

/// Record where a panic happened so the result can name the source line
fn install_panic_location_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let default_hook = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if let Some(location) = info.location() {
                let location = format!("{}:{}", location.file(), location.line());
                LAST_PANIC_LOCATION.with(|cell| *cell.borrow_mut() = Some(location));
            }
            if prints_panic_banner() {
                default_hook(info);
            }
        }));
    });
}

fn prints_panic_banner() -> bool {
    !CONTAINING_PANIC.with(Cell::get)
}

/// Catch a panic from `f` without printing the default panic banner
fn catch_contained<R>(f: impl FnOnce() -> R) -> thread::Result<R> {
    let previous = CONTAINING_PANIC.with(|flag| flag.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    CONTAINING_PANIC.with(|flag| flag.set(previous));
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
