//! Queue behavior: submission order, cancellation of queued and running
//! jobs, and the shared status indicator.

mod common;

use tokio::sync::broadcast;

use qobuz_dl::broadcast::{JobProgressEvent, JobStatus};
use qobuz_dl::error::QueueError;
use qobuz_dl::worker::{JobQueue, JobTarget};

use common::harness::WAIT;
use common::*;

fn seed_tracks(harness: &TestHarness, titles: &[(u64, &str)]) {
    for (id, title) in titles {
        harness.catalog.add_track(TrackBuilder::new(*id, title).build());
        harness
            .transport
            .serve(stream_url(*id), title.to_lowercase().as_bytes());
    }
}

async fn wait_idle(queue: &JobQueue) {
    tokio::time::timeout(WAIT, queue.wait_idle())
        .await
        .expect("queue never went idle");
}

async fn wait_for_held_fetch(harness: &TestHarness) {
    tokio::time::timeout(WAIT, harness.transport.fetch_held.notified())
        .await
        .expect("held fetch never started");
}

/// Terminal status per job id, in the order they were reported.
fn terminal_events(rx: &mut broadcast::Receiver<JobProgressEvent>) -> Vec<(String, JobStatus)> {
    let mut terminal = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if event.status.is_terminal() {
            terminal.push((event.job_id, event.status));
        }
    }
    terminal
}

#[tokio::test]
async fn test_jobs_run_in_submission_order() {
    let harness = TestHarness::new();
    seed_tracks(&harness, &[(1, "One"), (2, "Two"), (3, "Three")]);
    let queue = harness.queue();
    let mut events = queue.events().subscribe();

    let ids: Vec<String> = [1, 2, 3]
        .into_iter()
        .map(|id| queue.submit(JobTarget::track(id)))
        .collect();
    wait_idle(&queue).await;

    assert_eq!(
        harness.delivery.file_names(),
        vec![
            "Portishead - One.flac",
            "Portishead - Two.flac",
            "Portishead - Three.flac"
        ]
    );
    assert_eq!(
        terminal_events(&mut events),
        ids.into_iter()
            .map(|id| (id, JobStatus::Succeeded))
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_backlog_is_visible_while_a_job_runs() {
    let harness = TestHarness::new();
    seed_tracks(&harness, &[(1, "One"), (2, "Two")]);
    harness.transport.hold(stream_url(1));
    let queue = harness.queue();

    let first = queue.submit(JobTarget::track(1));
    let second = queue.submit(JobTarget::track(2));
    wait_for_held_fetch(&harness).await;

    let snapshot = queue.status().snapshot();
    assert!(snapshot.processing);
    assert_eq!(snapshot.title, "Downloading One");
    assert_eq!(snapshot.backlog.len(), 1);
    assert_eq!(snapshot.backlog[0].job_id, second);

    let jobs = queue.jobs();
    assert_eq!(jobs.len(), 2);
    assert_eq!((jobs[0].id.as_str(), jobs[0].status), (first.as_str(), JobStatus::Running));
    assert_eq!((jobs[1].id.as_str(), jobs[1].status), (second.as_str(), JobStatus::Queued));

    queue.cancel_all();
    wait_idle(&queue).await;
}

#[tokio::test]
async fn test_cancelling_a_queued_job_never_starts_it() {
    let harness = TestHarness::new();
    seed_tracks(&harness, &[(1, "One"), (2, "Two")]);
    harness.transport.hold(stream_url(1));
    let queue = harness.queue();
    let mut events = queue.events().subscribe();

    let first = queue.submit(JobTarget::track(1));
    let second = queue.submit(JobTarget::track(2));
    wait_for_held_fetch(&harness).await;

    queue.cancel(&second).unwrap();
    assert!(queue.status().snapshot().backlog.is_empty());
    queue.cancel(&first).unwrap();
    wait_idle(&queue).await;

    let calls = harness.catalog.calls();
    assert!(!calls.contains(&"track:2".to_string()));
    assert!(!calls.contains(&"stream:2".to_string()));
    assert!(harness.delivery.delivered().is_empty());

    let terminal = terminal_events(&mut events);
    assert!(terminal.contains(&(second, JobStatus::Cancelled)));
    assert!(terminal.contains(&(first, JobStatus::Cancelled)));
}

#[tokio::test]
async fn test_cancelling_the_running_job_promotes_the_next() {
    let harness = TestHarness::new();
    seed_tracks(&harness, &[(1, "One"), (2, "Two")]);
    harness.transport.hold(stream_url(1));
    let queue = harness.queue();
    let mut events = queue.events().subscribe();

    let first = queue.submit(JobTarget::track(1));
    let second = queue.submit(JobTarget::track(2));
    wait_for_held_fetch(&harness).await;

    queue.cancel(&first).unwrap();
    let jobs = queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, second);
    assert_eq!(jobs[0].status, JobStatus::Running);

    wait_idle(&queue).await;

    assert_eq!(harness.delivery.file_names(), vec!["Portishead - Two.flac"]);
    let terminal = terminal_events(&mut events);
    assert!(terminal.contains(&(first, JobStatus::Cancelled)));
    assert!(terminal.contains(&(second, JobStatus::Succeeded)));
}

#[tokio::test]
async fn test_cancelling_during_delivery_never_reports_success() {
    let harness = TestHarness::new();
    seed_tracks(&harness, &[(1, "One"), (2, "Two")]);
    harness.delivery.hold("Portishead - One.flac");
    let queue = harness.queue();
    let mut events = queue.events().subscribe();

    let first = queue.submit(JobTarget::track(1));
    let second = queue.submit(JobTarget::track(2));
    tokio::time::timeout(WAIT, harness.delivery.delivery_held.notified())
        .await
        .expect("held delivery never started");

    queue.cancel(&first).unwrap();
    wait_idle(&queue).await;

    assert_eq!(harness.delivery.file_names(), vec!["Portishead - Two.flac"]);
    let terminal = terminal_events(&mut events);
    assert!(terminal.contains(&(first.clone(), JobStatus::Cancelled)));
    assert!(!terminal.contains(&(first, JobStatus::Succeeded)));
    assert!(terminal.contains(&(second, JobStatus::Succeeded)));
}

#[tokio::test]
async fn test_cancel_all_drops_backlog_and_running_job() {
    let harness = TestHarness::new();
    seed_tracks(&harness, &[(1, "One"), (2, "Two"), (3, "Three")]);
    harness.transport.hold(stream_url(1));
    let queue = harness.queue();

    for id in [1, 2, 3] {
        queue.submit(JobTarget::track(id));
    }
    wait_for_held_fetch(&harness).await;

    queue.cancel_all();
    wait_idle(&queue).await;

    assert_eq!(harness.catalog.calls(), vec!["track:1", "stream:1"]);
    assert!(harness.delivery.delivered().is_empty());
    assert!(queue.jobs().is_empty());
}

#[tokio::test]
async fn test_status_returns_to_idle() {
    let harness = TestHarness::new();
    seed_tracks(&harness, &[(1, "One")]);
    let queue = harness.queue();

    queue.submit(JobTarget::track(1));
    wait_idle(&queue).await;

    let snapshot = queue.status().snapshot();
    assert!(!snapshot.processing);
    assert!(snapshot.backlog.is_empty());
    assert!(queue.is_idle());
}

#[tokio::test]
async fn test_failed_job_does_not_stall_the_queue() {
    let harness = TestHarness::new();
    seed_tracks(&harness, &[(2, "Two")]);
    let queue = harness.queue();
    let mut events = queue.events().subscribe();

    let missing = queue.submit(JobTarget::track(404));
    let present = queue.submit(JobTarget::track(2));
    wait_idle(&queue).await;

    assert_eq!(harness.delivery.file_names(), vec!["Portishead - Two.flac"]);
    assert_eq!(
        terminal_events(&mut events),
        vec![(missing, JobStatus::Failed), (present, JobStatus::Succeeded)]
    );
}

#[tokio::test]
async fn test_cancel_unknown_job_is_an_error() {
    let harness = TestHarness::new();
    seed_tracks(&harness, &[(1, "One")]);
    let queue = harness.queue();

    assert!(matches!(
        queue.cancel("no-such-job"),
        Err(QueueError::UnknownJob(_))
    ));

    let finished = queue.submit(JobTarget::track(1));
    wait_idle(&queue).await;
    assert!(matches!(
        queue.cancel(&finished),
        Err(QueueError::UnknownJob(_))
    ));
}
