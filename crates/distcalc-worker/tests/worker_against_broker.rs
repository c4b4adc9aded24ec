// Workers driving an in-process broker, both directly and over HTTP.

use async_trait::async_trait;
use distcalc_broker::{api::create_rest_api, Broker, BrokerConfig};
use distcalc_core::{ExpressionStatus, OperationTimes, Task, TaskReport};
use distcalc_worker::{BrokerClient, TaskExecutor, TaskSource, Worker, WorkerConfig};
use std::sync::Arc;
use std::time::Duration;

struct InProcess(Arc<Broker>);

#[async_trait]
impl TaskSource for InProcess {
    async fn fetch_task(&self) -> anyhow::Result<Option<Task>> {
        Ok(self.0.poll())
    }

    async fn send_report(&self, report: &TaskReport) -> anyhow::Result<bool> {
        Ok(self.0.report(report.clone()).is_ok())
    }
}

fn broker_with(ms: u64) -> Arc<Broker> {
    let mut config = BrokerConfig::default();
    config.operations = OperationTimes::uniform(ms);
    Arc::new(Broker::new(config).unwrap())
}

fn worker_config(concurrency: usize) -> WorkerConfig {
    WorkerConfig {
        concurrency,
        worker_id: Some("it".to_string()),
        poll_interval_ms: 5,
        graceful_shutdown_timeout_secs: 5,
        ..WorkerConfig::default()
    }
}

async fn wait_until_finalized(broker: &Broker, ids: &[u64]) {
    for _ in 0..200 {
        if ids.iter().all(|id| broker.status(*id).unwrap().is_finalized()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expressions did not finish");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_workers_evaluate_submitted_expressions() {
    let broker = broker_with(1000);
    let cases = [("2+2*2", 6), ("(8-3)*(6/2)-1", 14), ("1-2-3-4", -8), ("10/(5-5)", 0)];
    let ids: Vec<_> = cases
        .iter()
        .map(|(text, _)| broker.submit(text, 1).unwrap())
        .collect();

    // Skip the simulated cost; claim windows stay generous.
    let worker = Worker::new(worker_config(3), Arc::new(InProcess(broker.clone())))
        .with_executor(TaskExecutor::immediate());
    let running = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.run().await })
    };

    wait_until_finalized(&broker, &ids).await;
    worker.shutdown();
    running.await.unwrap().unwrap();

    for ((text, expected), id) in cases.iter().zip(&ids).take(3) {
        assert_eq!(
            broker.status(*id).unwrap().status(),
            &ExpressionStatus::Done(*expected),
            "{}",
            text
        );
    }
    assert_eq!(
        broker.status(ids[3]).unwrap().status(),
        &ExpressionStatus::Error("division by zero".to_string())
    );
    assert!(broker.queue().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_http_client_round_trip() {
    let broker = broker_with(1000);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_rest_api(broker.clone());
    tokio::spawn(async move { axum::serve(listener, app).await });

    let client = BrokerClient::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    assert!(client.fetch_task().await.unwrap().is_none());

    let id = broker.submit("6*7", 1).unwrap();
    let task = client.fetch_task().await.unwrap().expect("task");
    assert_eq!((task.arg1, task.arg2, task.expression_id), (6, 7, id));

    assert!(client.send_report(&TaskReport::success(task.id, 42)).await.unwrap());
    assert_eq!(broker.status(id).unwrap().status(), &ExpressionStatus::Done(42));

    // The task is gone now; a second report is rejected.
    assert!(!client.send_report(&TaskReport::success(task.id, 42)).await.unwrap());
}
