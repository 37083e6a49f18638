//! Integration tests for parameter validation of steps and jobs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use jobflow_engine::{
    Action, Constraints, Job, JobError, StateViolation, Status, Step, Validate, Violation,
};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct TestError(String);

#[derive(Debug, Clone)]
struct ConnectParams {
    host: Option<String>,
    port: i64,
}

impl ConnectParams {
    fn valid() -> Self {
        Self {
            host: Some("db.internal".to_string()),
            port: 5432,
        }
    }

    fn missing_host() -> Self {
        Self {
            host: None,
            port: 5432,
        }
    }
}

impl Validate for ConnectParams {
    fn violations(&self) -> Vec<Violation> {
        Constraints::new()
            .not_empty("host", self.host.as_deref())
            .positive("port", self.port)
            .check(self.port <= 65535, "port", "must be at most 65535")
            .finish()
    }
}

struct Connect {
    name: &'static str,
    params: Arc<Mutex<ConnectParams>>,
    runs: Arc<AtomicUsize>,
}

impl Connect {
    fn new(name: &'static str, params: ConnectParams) -> (Self, Arc<Mutex<ConnectParams>>) {
        let params = Arc::new(Mutex::new(params));
        let step = Self {
            name,
            params: Arc::clone(&params),
            runs: Arc::new(AtomicUsize::new(0)),
        };
        (step, params)
    }
}

impl Step for Connect {
    type Output = ();
    type Error = TestError;

    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&self) -> Result<(), TestError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&self) -> Result<bool, TestError> {
        Ok(true)
    }

    fn violations(&self) -> Vec<Violation> {
        self.params.lock().expect("params lock").violations()
    }
}

/// Decides validity through an explicit switch instead of violations.
struct Gated {
    open: Arc<AtomicBool>,
}

impl Step for Gated {
    type Output = ();
    type Error = TestError;

    fn name(&self) -> &'static str {
        "gated"
    }

    fn run(&self) -> Result<(), TestError> {
        Ok(())
    }

    fn validate(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

fn observed_job() -> (Job<TestError>, Arc<Mutex<Vec<Status>>>) {
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&statuses);
    let job = Job::with_listener(move |status| sink.lock().expect("listener lock").push(status));
    (job, statuses)
}

fn seen(statuses: &Mutex<Vec<Status>>) -> Vec<Status> {
    statuses.lock().expect("listener lock").clone()
}

#[test]
fn invalid_step_makes_job_invalid_on_registration() -> anyhow::Result<()> {
    let (job, statuses) = observed_job();
    let (step, _params) = Connect::new("connect", ConnectParams::missing_host());

    job.add_step(step)?;

    assert_eq!(job.step_status("connect"), Some(Status::Invalid));
    assert_eq!(job.status(), Status::Invalid);
    assert_eq!(seen(&statuses), vec![Status::Invalid]);
    Ok(())
}

#[test]
fn fixing_parameters_and_revalidating_restores_ready() -> anyhow::Result<()> {
    let (job, statuses) = observed_job();
    let (step, params) = Connect::new("connect", ConnectParams::missing_host());
    job.add_step(step)?;

    *params.lock().expect("params lock") = ConnectParams::valid();
    job.validate("connect")?;

    assert_eq!(job.step_status("connect"), Some(Status::Ready));
    assert_eq!(job.status(), Status::Ready);
    assert_eq!(seen(&statuses), vec![Status::Invalid, Status::Ready]);
    Ok(())
}

#[test]
fn invalid_job_cannot_run() -> anyhow::Result<()> {
    let (job, _statuses) = observed_job();
    let (valid, _) = Connect::new("prepare", ConnectParams::valid());
    let prepare_runs = Arc::clone(&valid.runs);
    let (invalid, _) = Connect::new("connect", ConnectParams::missing_host());
    job.add_step(valid)?;
    job.add_step(invalid)?;

    let err = job.run().expect_err("connect is invalid");

    assert!(matches!(
        err,
        JobError::StateViolation(StateViolation {
            status: Status::Invalid,
            action: Action::Run
        })
    ));
    assert_eq!(prepare_runs.load(Ordering::SeqCst), 0);
    assert_eq!(job.step_status("prepare"), Some(Status::Ready));
    assert!(job.progress().is_empty());
    Ok(())
}

#[test]
fn run_revalidates_parameters_changed_after_registration() -> anyhow::Result<()> {
    let (job, statuses) = observed_job();
    let (step, params) = Connect::new("connect", ConnectParams::valid());
    let runs = Arc::clone(&step.runs);
    job.add_step(step)?;
    assert_eq!(job.status(), Status::Ready);

    params.lock().expect("params lock").port = 70_000;
    let err = job.run().expect_err("port is out of range");

    assert!(matches!(err, JobError::StateViolation(_)));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(job.step_status("connect"), Some(Status::Invalid));
    assert_eq!(seen(&statuses), vec![Status::Invalid]);
    Ok(())
}

#[test]
fn validating_unknown_step_is_rejected() {
    let (job, _statuses) = observed_job();

    let err = job.validate("connect").expect_err("connect is unknown");

    assert!(matches!(err, JobError::UnknownStep { step } if step == "connect"));
}

#[test]
fn rolled_back_step_cannot_be_revalidated() -> anyhow::Result<()> {
    let (job, _statuses) = observed_job();
    let (step, _) = Connect::new("connect", ConnectParams::valid());
    job.add_step(step)?;
    job.run()?;
    job.rollback()?;

    let err = job.validate("connect").expect_err("rollback is final");

    assert!(matches!(
        err,
        JobError::StateViolation(StateViolation {
            status: Status::SuccessRollback,
            action: Action::Validate
        })
    ));
    Ok(())
}

#[test]
fn skipped_invalid_step_does_not_block_the_run() -> anyhow::Result<()> {
    let (job, statuses) = observed_job();
    let (valid, _) = Connect::new("prepare", ConnectParams::valid());
    let (invalid, _) = Connect::new("connect", ConnectParams::missing_host());
    let connect_runs = Arc::clone(&invalid.runs);
    job.add_step(valid)?;
    job.add_step(invalid)?;

    job.skip("connect")?;
    job.run()?;

    assert_eq!(connect_runs.load(Ordering::SeqCst), 0);
    assert_eq!(job.status(), Status::Success);
    assert_eq!(
        seen(&statuses),
        vec![
            Status::Invalid,
            Status::Ready,
            Status::Waiting,
            Status::Running,
            Status::Success,
        ]
    );
    Ok(())
}

#[test]
fn unskipping_revalidates_the_step() -> anyhow::Result<()> {
    let (job, _statuses) = observed_job();
    let (step, params) = Connect::new("connect", ConnectParams::missing_host());
    job.add_step(step)?;
    job.skip("connect")?;

    job.unskip("connect")?;
    assert_eq!(job.step_status("connect"), Some(Status::Invalid));

    job.skip("connect")?;
    params.lock().expect("params lock").host = Some("db.internal".to_string());
    job.unskip("connect")?;
    assert_eq!(job.step_status("connect"), Some(Status::Ready));
    assert_eq!(job.status(), Status::Ready);
    Ok(())
}

#[test]
fn overridden_validation_is_honoured() -> anyhow::Result<()> {
    let (job, _statuses) = observed_job();
    let open = Arc::new(AtomicBool::new(false));
    job.add_step(Gated {
        open: Arc::clone(&open),
    })?;
    assert_eq!(job.status(), Status::Invalid);

    open.store(true, Ordering::SeqCst);
    job.run()?;

    assert_eq!(job.status(), Status::Success);
    Ok(())
}
