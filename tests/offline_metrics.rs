use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::http::Method;
use metrics_util::debugging::DebuggingRecorder;
use url::Url;

use todolist::offline::{
    Network, OfflineError, OfflineRequest, OfflineResponse, WorkerContext,
};

#[derive(Default)]
struct Flaky {
    offline: AtomicBool,
}

#[async_trait]
impl Network for Flaky {
    async fn fetch(&self, _request: &OfflineRequest) -> Result<OfflineResponse, OfflineError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(OfflineError::network("down"));
        }
        Ok(OfflineResponse::text(200, "ok"))
    }
}

#[tokio::test]
async fn offline_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let network = Arc::new(Flaky::default());
    let origin = Url::parse("http://localhost:3000").unwrap();
    let context = WorkerContext::builder(origin.clone(), network.clone()).build();

    let asset = OfflineRequest::get(origin.join("/css/index.css").unwrap());
    context.handle_fetch(asset.clone()).await.unwrap();
    context.handle_fetch(asset).await.unwrap();

    network.offline.store(true, Ordering::SeqCst);
    context
        .handle_fetch(OfflineRequest::new(
            Method::POST,
            origin.join("/api/user/tasks").unwrap(),
        ))
        .await
        .unwrap();
    context.sync().await.unwrap();

    network.offline.store(false, Ordering::SeqCst);
    context.sync().await.unwrap();

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "todolist_offline_cache_hit_total",
        "todolist_offline_cache_miss_total",
        "todolist_offline_queued_total",
        "todolist_offline_replay_failed_total",
        "todolist_offline_replayed_total",
    ];
    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
