use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use vcsgrip::executor::{execute_jobs, ExecutorOptions};
use vcsgrip::output::{output_results, Palette, Reporter};
use vcsgrip_core::app::{add_dependencies, validate_dependencies};
use vcsgrip_core::domain::{CommandOutput, Job, Operation, OperationKind, RepoKind, ReturnCode};
use vcsgrip_core::ports::VcsClient;

/// Shared log of client calls plus a running-count gauge
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

struct RecordingClient {
    path: PathBuf,
    recorder: Arc<Recorder>,
    delay: Duration,
}

impl VcsClient for RecordingClient {
    fn kind(&self) -> RepoKind {
        RepoKind::Git
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn supports(&self, _operation: OperationKind) -> bool {
        true
    }

    fn run(&self, operation: &Operation) -> Result<CommandOutput> {
        let now = self.recorder.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder.max_running.fetch_max(now, Ordering::SeqCst);
        if let Ok(mut events) = self.recorder.events.lock() {
            events.push(format!("start {}", self.path.display()));
        }

        thread::sleep(self.delay);

        if let Ok(mut events) = self.recorder.events.lock() {
            events.push(format!("end {}", self.path.display()));
        }
        self.recorder.running.fetch_sub(1, Ordering::SeqCst);

        match operation {
            Operation::Custom { args } if args.iter().any(|a| a == "explode") => {
                panic!("client blew up")
            }
            Operation::Custom { args } if args.iter().any(|a| a == "fail") => {
                anyhow::bail!("could not talk to the remote")
            }
            _ => Ok(CommandOutput::new(
                "git status",
                Some(self.path.clone()),
                format!("ran in {}", self.path.display()),
                ReturnCode::Success,
            )),
        }
    }
}

fn recording_job(
    path: &str,
    recorder: &Arc<Recorder>,
    delay_ms: u64,
    operation: Operation,
) -> Job {
    let client = RecordingClient {
        path: PathBuf::from(path),
        recorder: Arc::clone(recorder),
        delay: Duration::from_millis(delay_ms),
    };
    Job::new(Arc::new(client), operation)
}

#[test]
fn test_results_are_displayed_in_path_order() -> Result<()> {
    let recorder = Arc::new(Recorder::default());
    let jobs = vec![
        recording_job("d", &recorder, 1, Operation::Status { quiet: false }),
        recording_job("b/c", &recorder, 15, Operation::Status { quiet: false }),
        recording_job("a", &recorder, 30, Operation::Status { quiet: false }),
    ];
    let options = ExecutorOptions { workers: 3, ..ExecutorOptions::default() };
    let results = execute_jobs(jobs, &options, &mut std::io::sink());
    assert_eq!(results.len(), 3);

    let mut reporter = Reporter::new(Vec::new(), Palette::plain());
    output_results(&results, |result, hide| reporter.output_result(result, hide), false)?;
    let text = String::from_utf8(reporter.into_inner())?;
    assert_eq!(
        text,
        "=== a (git) ===\nran in a\n=== b/c (git) ===\nran in b/c\n=== d (git) ===\nran in d\n"
    );
    Ok(())
}

#[test]
fn test_parent_finishes_before_nested_job_starts() -> Result<()> {
    let recorder = Arc::new(Recorder::default());
    let mut jobs = vec![
        recording_job("./sub", &recorder, 1, Operation::Pull),
        recording_job(".", &recorder, 40, Operation::Pull),
        recording_job("./other", &recorder, 1, Operation::Pull),
    ];
    add_dependencies(&mut jobs);
    validate_dependencies(&jobs)?;

    let options = ExecutorOptions { workers: 4, ..ExecutorOptions::default() };
    let results = execute_jobs(jobs, &options, &mut std::io::sink());
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.code() == ReturnCode::Success));

    let parent_end = recorder.position("end .");
    for nested in ["start ./sub", "start ./other"] {
        let nested_start = recorder.position(nested);
        assert!(parent_end.is_some() && nested_start.is_some());
        assert!(parent_end < nested_start, "{nested} ran before '.' finished");
    }
    Ok(())
}

#[test]
fn test_single_worker_runs_one_job_at_a_time() {
    let recorder = Arc::new(Recorder::default());
    let jobs: Vec<Job> = (0..5)
        .map(|i| recording_job(&format!("repo{i}"), &recorder, 5, Operation::Pull))
        .collect();
    let results = execute_jobs(jobs, &ExecutorOptions::default(), &mut std::io::sink());

    assert_eq!(results.len(), 5);
    assert_eq!(recorder.max_running.load(Ordering::SeqCst), 1);
}

#[test]
fn test_worker_limit_is_respected() {
    let recorder = Arc::new(Recorder::default());
    let jobs: Vec<Job> = (0..8)
        .map(|i| recording_job(&format!("repo{i}"), &recorder, 20, Operation::Pull))
        .collect();
    let options = ExecutorOptions { workers: 3, ..ExecutorOptions::default() };
    let results = execute_jobs(jobs, &options, &mut std::io::sink());

    assert_eq!(results.len(), 8);
    let max = recorder.max_running.load(Ordering::SeqCst);
    assert!((1..=3).contains(&max), "saw {max} concurrent jobs");
}

#[test]
fn test_failures_are_contained_per_job() {
    let recorder = Arc::new(Recorder::default());
    let custom = |arg: &str| Operation::Custom { args: vec![arg.to_string()] };
    let jobs = vec![
        recording_job("a", &recorder, 1, custom("explode")),
        recording_job("b", &recorder, 1, custom("fail")),
        recording_job("c", &recorder, 1, custom("status")),
    ];
    let options = ExecutorOptions { workers: 2, ..ExecutorOptions::default() };
    let results = execute_jobs(jobs, &options, &mut std::io::sink());
    assert_eq!(results.len(), 3);

    let by_path = |path: &str| results.iter().find(|r| r.path() == Path::new(path));
    let prefix = "Invocation of command 'custom' on client 'git' failed: ";

    let exploded = by_path("a").map(|r| (r.is_failure(), r.output()));
    let (failed, output) = exploded.unwrap_or_default();
    assert!(failed);
    assert!(output.starts_with(&format!("{prefix}panic: client blew up")), "{output}");

    let remote = by_path("b").map(|r| (r.is_failure(), r.output()));
    let (failed, output) = remote.unwrap_or_default();
    assert!(failed);
    assert_eq!(output, format!("{prefix}could not talk to the remote"));

    assert!(by_path("c").is_some_and(|r| r.code() == ReturnCode::Success));
}

#[test]
fn test_every_job_yields_exactly_one_result() {
    let recorder = Arc::new(Recorder::default());
    let paths: Vec<String> = (0..20).map(|i| format!("ws/repo{i:02}")).collect();
    let jobs: Vec<Job> = paths
        .iter()
        .map(|path| recording_job(path, &recorder, 0, Operation::Remotes))
        .collect();
    let options = ExecutorOptions { workers: 6, ..ExecutorOptions::default() };
    let results = execute_jobs(jobs, &options, &mut std::io::sink());

    assert_eq!(results.len(), paths.len());
    let seen: HashSet<&Path> = results.iter().map(|r| r.path()).collect();
    assert_eq!(seen.len(), paths.len());
    assert!(paths.iter().all(|p| seen.contains(Path::new(p))));
}
