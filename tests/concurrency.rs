// ABOUTME: Tests that concurrent sessions are independent of each other.
// ABOUTME: Mixed failures and stalled setups must not disturb healthy sessions.

mod support;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use support::{Event, Plan, Resource, fake_pipeline, init_tracing, local_pair};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tunneler::types::{SessionId, SessionIds};

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Echoed,
    Closed,
    Pending,
}

const PATTERN: [Plan; 8] = [
    Plan::Healthy,
    Plan::FailDial,
    Plan::Healthy,
    Plan::FailAuth,
    Plan::Healthy,
    Plan::FailChannel,
    Plan::Healthy,
    Plan::StallDial,
];

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_sessions_do_not_affect_each_other() {
    init_tracing();
    let plans: Vec<Plan> = PATTERN.iter().copied().cycle().take(16).collect();
    let (pipeline, log) = fake_pipeline(plans, None);
    let ids = SessionIds::default();

    let clients = (0..16).map(|n| {
        let (mut client, local) = local_pair(&log);
        let pipeline = Arc::clone(&pipeline);
        let id = ids.next_id();
        tokio::spawn(async move {
            let _ = pipeline.run(id, local).await;
        });

        async move {
            let message = format!("PING {n:02}");
            // A failed session may already have closed its end.
            let _ = client.write_all(message.as_bytes()).await;

            let mut buf = vec![0u8; message.len()];
            match timeout(Duration::from_millis(500), client.read_exact(&mut buf)).await {
                Ok(Ok(_)) => {
                    assert_eq!(buf, message.as_bytes());
                    Outcome::Echoed
                }
                Ok(Err(_)) => Outcome::Closed,
                Err(_) => Outcome::Pending,
            }
        }
    });
    let outcomes = join_all(clients).await;

    let count = |wanted: Outcome| outcomes.iter().filter(|o| **o == wanted).count();
    assert_eq!(count(Outcome::Echoed), 8, "outcomes: {outcomes:?}");
    assert_eq!(count(Outcome::Closed), 6, "outcomes: {outcomes:?}");
    assert_eq!(count(Outcome::Pending), 2, "outcomes: {outcomes:?}");

    assert_eq!(log.count(Event::Dial), 16);
    assert_eq!(log.count(Event::Authenticate), 12);
    assert_eq!(log.count(Event::OpenChannel), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stalled_session_does_not_block_later_ones() {
    init_tracing();
    let (pipeline, log) = fake_pipeline([Plan::StallChannel, Plan::Healthy], None);

    let (_stalled_client, stalled_local) = local_pair(&log);
    let stalled = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.run(SessionId::new(1), stalled_local).await }
    });
    // Let the first session reach its stalled channel open.
    while log.count(Event::OpenChannel) == 0 {
        tokio::task::yield_now().await;
    }

    let (mut client, local) = local_pair(&log);
    let healthy = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.run(SessionId::new(2), local).await }
    });

    client.write_all(b"PING").await.unwrap();
    let mut buf = [0u8; 4];
    timeout(Duration::from_secs(5), client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"PING");
    drop(client);

    timeout(Duration::from_secs(5), healthy)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(!stalled.is_finished());
    assert_eq!(log.count(Event::Released(Resource::Channel)), 1);
    stalled.abort();
}

