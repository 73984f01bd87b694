use std::time::Duration;

use anyhow::anyhow;
use bytes::Bytes;

use common::roster::{Roster, WorkerSpec};
use common::rpc::WorkerPhase;
use common::utils::emit_one;
use common::{KeyValue, MapOutput, Workload};
use mr_coordinator::{CoordinatorConfig, JobError, JobSpec, JobState, MRCoordinator};
use mr_worker::{spawn_local, MRWorker, WorkerConfig};
use workload::Registry;

fn fragile_map(kv: KeyValue, _aux: Bytes) -> MapOutput {
    if kv.value == "bad" {
        return Err(anyhow!("cannot map {kv}"));
    }
    emit_one(kv)
}

fn registry() -> Registry {
    let mut registry = Registry::builtin();
    registry.register("fragile", Workload::new(fragile_map, workload::sum::reduce));
    registry
}

fn config() -> CoordinatorConfig {
    CoordinatorConfig {
        task_timeout: Duration::from_secs(10),
        health_timeout: Duration::from_secs(2),
        ..CoordinatorConfig::default()
    }
}

/// One worker per id; `None` gets an address nothing listens on.
async fn start(ids: &[Option<&str>]) -> (Roster, Vec<Option<MRWorker>>) {
    let mut specs = Vec::new();
    let mut workers = Vec::new();

    for (i, id) in ids.iter().enumerate() {
        let roster_id = format!("w{i}");
        let addr = match id {
            Some(id) => {
                let worker = MRWorker::new(*id, registry(), WorkerConfig::default());
                let (addr, _) = spawn_local(worker.clone()).await.unwrap();
                workers.push(Some(worker));
                addr
            }
            None => {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                let addr = listener.local_addr().unwrap();
                drop(listener);
                workers.push(None);
                addr
            }
        };
        specs.push(WorkerSpec {
            id: roster_id,
            address: format!("http://{addr}"),
        });
    }

    (Roster::new(specs).unwrap(), workers)
}

fn pairs(kvs: &[(&'static str, &'static str)]) -> Vec<KeyValue> {
    kvs.iter().map(|(k, v)| KeyValue::new(*k, *v)).collect()
}

fn six_records() -> Vec<KeyValue> {
    pairs(&[
        ("k1", "1"),
        ("k2", "1"),
        ("k1", "1"),
        ("k3", "1"),
        ("k1", "1"),
        ("k2", "1"),
    ])
}

#[tokio::test]
async fn six_records_on_two_workers() {
    let (roster, _workers) = start(&[Some("w0"), Some("w1")]).await;
    let coordinator = MRCoordinator::new(roster, config()).unwrap();

    let outcome = coordinator
        .run_job(JobSpec::new("sum", six_records()))
        .await
        .unwrap();

    // w0 owns k1 and k3, w1 owns k2; each reduces in key order.
    assert_eq!(
        outcome.results,
        pairs(&[("k1", "3"), ("k3", "1"), ("k2", "2")])
    );
    assert_eq!(outcome.stats.records_in, 6);
    assert_eq!(outcome.stats.map_emitted, 6);
    assert_eq!(outcome.stats.shuffle_kept + outcome.stats.shuffle_sent, 6);
    assert_eq!(outcome.stats.keys_reduced, 3);
    assert_eq!(outcome.stats.results, 3);
    assert_ne!(outcome.job_id, 0);
}

#[tokio::test]
async fn matches_the_local_engine() {
    let text = [
        "the quick brown fox",
        "jumps over the lazy dog",
        "the dog sleeps",
        "a fox runs",
        "over and over",
    ];
    let records = text
        .iter()
        .enumerate()
        .map(|(i, line)| KeyValue::new(format!("doc:{}", i + 1), line.to_string()))
        .collect::<Vec<_>>();
    let wc = workload::try_named("wc").unwrap();

    for n in [1usize, 3] {
        let ids = (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>();
        let ids = ids.iter().map(|id| Some(id.as_str())).collect::<Vec<_>>();
        let (roster, _workers) = start(&ids).await;
        let coordinator = MRCoordinator::new(roster, config()).unwrap();

        let outcome = coordinator
            .run_job(JobSpec::new("wc", records.clone()))
            .await
            .unwrap();
        let local = standalone::run_local(&wc, &Bytes::new(), records.clone(), n as u32).unwrap();
        assert_eq!(outcome.results, local, "roster of {n}");
    }
}

#[tokio::test]
async fn empty_input_gives_empty_output() {
    let (roster, _workers) = start(&[Some("w0"), Some("w1"), Some("w2")]).await;
    let coordinator = MRCoordinator::new(roster, config()).unwrap();

    let outcome = coordinator
        .run_job(JobSpec::new("sum", Vec::new()))
        .await
        .unwrap();
    assert!(outcome.results.is_empty());
}

#[tokio::test]
async fn map_failure_stops_before_shuffle() {
    let (roster, workers) = start(&[Some("w0"), Some("w1")]).await;
    let coordinator = MRCoordinator::new(roster, config()).unwrap();

    // The second slice holds the bad record.
    let records = pairs(&[("a", "1"), ("b", "1"), ("c", "1"), ("d", "bad")]);
    let err = coordinator
        .run_job(JobSpec::new("fragile", records))
        .await
        .unwrap_err();

    assert!(matches!(err, JobError::TransformFailure { .. }), "{err}");
    assert_eq!(err.state(), Some(JobState::Mapping));
    assert_eq!(err.worker(), Some("w1"));

    let w0 = workers[0].as_ref().unwrap();
    let w1 = workers[1].as_ref().unwrap();
    assert_eq!(w0.phase().await, WorkerPhase::MapDone);
    assert_eq!(w1.phase().await, WorkerPhase::Failed);
    assert!(w0.intermediate().await.is_empty());
}

#[tokio::test]
async fn reduce_failure_names_the_step() {
    let (roster, _workers) = start(&[Some("w0")]).await;
    let coordinator = MRCoordinator::new(roster, config()).unwrap();

    let err = coordinator
        .run_job(JobSpec::new("sum", pairs(&[("k", "1"), ("k", "x")])))
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::TransformFailure { .. }), "{err}");
    assert_eq!(err.state(), Some(JobState::Reducing));
}

#[tokio::test]
async fn unreachable_worker_fails_the_health_check() {
    let (roster, workers) = start(&[Some("w0"), None]).await;
    let coordinator = MRCoordinator::new(roster, config()).unwrap();

    let err = coordinator
        .run_job(JobSpec::new("sum", six_records()))
        .await
        .unwrap_err();
    assert!(
        matches!(err, JobError::Unavailable { .. } | JobError::Timeout { .. }),
        "{err}"
    );
    assert_eq!(err.state(), Some(JobState::HealthCheck));
    assert_eq!(err.worker(), Some("w1"));

    // Nothing was sent to the healthy worker.
    assert_eq!(
        workers[0].as_ref().unwrap().phase().await,
        WorkerPhase::Idle
    );
}

#[tokio::test]
async fn wrong_identity_is_unavailable() {
    let (roster, _workers) = start(&[Some("w0"), Some("imposter")]).await;
    let coordinator = MRCoordinator::new(roster, config()).unwrap();

    let err = coordinator
        .run_job(JobSpec::new("sum", six_records()))
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Unavailable { .. }), "{err}");
    assert_eq!(err.worker(), Some("w1"));
    assert!(err.to_string().contains("imposter"));
}

#[tokio::test]
async fn unknown_workload_is_rejected() {
    let (roster, _workers) = start(&[Some("w0")]).await;
    let coordinator = MRCoordinator::new(roster, config()).unwrap();

    let err = coordinator
        .run_job(JobSpec::new("nope", six_records()))
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Rejected { .. }), "{err}");
    assert_eq!(err.state(), Some(JobState::Mapping));
}

#[tokio::test]
async fn workers_are_reset_between_jobs() {
    let (roster, workers) = start(&[Some("w0"), Some("w1")]).await;
    let coordinator = MRCoordinator::new(roster.clone(), config()).unwrap();

    // Leave w1 failed, then run a clean job on the same workers.
    let records = pairs(&[("a", "1"), ("b", "bad")]);
    coordinator
        .run_job(JobSpec::new("fragile", records))
        .await
        .unwrap_err();
    assert_eq!(
        workers[1].as_ref().unwrap().phase().await,
        WorkerPhase::Failed
    );

    let first = coordinator
        .run_job(JobSpec::new("sum", six_records()))
        .await
        .unwrap();
    let second = coordinator
        .run_job(JobSpec::new("sum", six_records()))
        .await
        .unwrap();
    assert_eq!(first.results, second.results);
    assert_ne!(first.job_id, second.job_id);

    // Without the reset barrier the workers still hold the last job.
    let no_reset = MRCoordinator::new(
        roster,
        CoordinatorConfig {
            reset_before_job: false,
            ..config()
        },
    )
    .unwrap();
    let err = no_reset
        .run_job(JobSpec::new("sum", six_records()))
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Rejected { .. }), "{err}");
    assert_eq!(err.state(), Some(JobState::Mapping));
}

#[tokio::test]
async fn status_and_reset_report_every_worker() {
    let (roster, workers) = start(&[Some("w0"), None]).await;
    let coordinator = MRCoordinator::new(roster, config()).unwrap();

    let status = coordinator.status().await;
    assert_eq!(status.len(), 2);
    assert_eq!(status[0].0.id, "w0");
    let health = status[0].1.as_ref().unwrap();
    assert_eq!(health.worker_phase(), WorkerPhase::Idle);
    assert!(status[1].1.is_err());

    let err = coordinator.reset_all().await.unwrap_err();
    assert_eq!(err.worker(), Some("w1"));
    assert_eq!(
        workers[0].as_ref().unwrap().phase().await,
        WorkerPhase::Idle
    );
}
