//! Bounded worker pool.
//!
//! A fixed-size set of consumer tasks shares the queue handle; each worker
//! dequeues one job, runs the pipeline to completion, acknowledges, then
//! dequeues again. The pool size is deliberate admission control: external
//! generation calls are costly and rate-limited, so concurrency is capped
//! rather than fanned out.
//!
//! There is no mid-run cancellation: shutdown stops dequeuing but lets
//! in-flight runs reach a terminal state, since partial file writes and
//! in-flight agent calls are not compensated.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::pipeline::PipelineRunner;
use crate::queue::JobQueue;

/// Handle to a running pool of pipeline workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkerPool {
    /// Spawn `size` workers over the shared queue and runner.
    pub fn start(size: usize, queue: Arc<JobQueue>, runner: Arc<PipelineRunner>) -> Self {
        assert!(size > 0, "worker pool size must be at least 1");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = (0..size)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                let runner = Arc::clone(&runner);
                let mut shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, queue, runner, &mut shutdown_rx).await;
                })
            })
            .collect();

        info!(size, "worker pool started");
        Self {
            handles,
            shutdown_tx,
        }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Signal shutdown and wait for every worker to finish its current
    /// run. The queue is closed so blocked workers wake up and exit.
    pub async fn shutdown(self, queue: &JobQueue) {
        let _ = self.shutdown_tx.send(true);
        queue.close().await;
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task panicked");
            }
        }
        info!("worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<JobQueue>,
    runner: Arc<PipelineRunner>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        let delivery = tokio::select! {
            _ = shutdown_rx.changed() => break,
            delivery = queue.dequeue() => match delivery {
                Some(d) => d,
                // Queue closed and drained.
                None => break,
            },
        };

        debug!(
            worker_id,
            generation_id = %delivery.data.generation_id,
            "worker picked up job"
        );

        // Once dequeued, the run proceeds to a terminal state regardless
        // of shutdown signals.
        let outcome = runner.run(&delivery.data).await;

        let ack = if outcome.success {
            queue.ack_completed(delivery.job_id).await
        } else {
            let message = outcome.error.as_deref().unwrap_or("unknown error");
            queue.ack_failed(delivery.job_id, message).await
        };
        if let Err(e) = ack {
            error!(
                worker_id,
                generation_id = %outcome.generation_id,
                error = %e,
                "failed to acknowledge job"
            );
        }
    }
    debug!(worker_id, "worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{
        AgentResponse, AgentUsage, CoderAgent, ScriptedBilling, ScriptedCoder, ScriptedDeployer,
        ScriptedPlanner,
    };
    use crate::emit::FileEmitter;
    use crate::models::{BuildPlan, GeneratedFile, JobData, MinimalSpec};
    use crate::progress::{ProgressStore, RunStatus};
    use crate::queue::RetentionPolicy;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    fn job(generation_id: &str) -> JobData {
        JobData {
            generation_id: generation_id.into(),
            app_id: format!("app_{}", generation_id),
            org_id: "org_1".into(),
            mvs: MinimalSpec::new("manage rental properties"),
            blueprint_id: "pms".into(),
            industry_overlay: None,
        }
    }

    /// Coder that tracks how many invocations run concurrently.
    struct GaugedCoder {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl GaugedCoder {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CoderAgent for GaugedCoder {
        async fn generate(
            &self,
            _plan: &BuildPlan,
        ) -> anyhow::Result<AgentResponse<Vec<GeneratedFile>>> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            // Hold the slot long enough for overlap to be observable.
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(AgentResponse::new(
                vec![GeneratedFile {
                    path: "main.ts".into(),
                    content: "export {}\n".into(),
                }],
                AgentUsage::default(),
            ))
        }
    }

    async fn wait_for_terminal(progress: &ProgressStore, ids: &[&str]) {
        for _ in 0..200 {
            let all_done = ids.iter().all(|id| {
                progress
                    .get_progress(id)
                    .map(|p| p.status.is_terminal())
                    .unwrap_or(false)
            });
            if all_done {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("runs did not reach a terminal state in time");
    }

    #[tokio::test]
    async fn pool_never_exceeds_its_size() {
        let dir = tempdir().unwrap();
        let progress = Arc::new(ProgressStore::new());
        let coder = Arc::new(GaugedCoder::new());
        let runner = Arc::new(PipelineRunner::new(
            Arc::new(ScriptedPlanner),
            Arc::clone(&coder) as Arc<dyn CoderAgent>,
            Arc::new(ScriptedDeployer),
            Arc::new(ScriptedBilling),
            FileEmitter::new(dir.path()),
            Arc::clone(&progress),
        ));

        let queue = crate::queue::JobQueue::new(RetentionPolicy::default());
        let ids = ["gen_1", "gen_2", "gen_3", "gen_4", "gen_5"];
        for id in ids {
            let j = job(id);
            progress.start_run(&j, &j.app_id).unwrap();
            queue.enqueue(j).await.unwrap();
        }

        let pool = WorkerPool::start(2, Arc::clone(&queue), runner);
        wait_for_terminal(&progress, &ids).await;
        pool.shutdown(&queue).await;

        assert!(
            coder.peak.load(Ordering::SeqCst) <= 2,
            "observed more concurrent runs than the pool size"
        );
        for id in ids {
            assert_eq!(progress.get_progress(id).unwrap().status, RunStatus::Completed);
        }
    }

    #[tokio::test]
    async fn workers_acknowledge_success_and_failure() {
        let dir = tempdir().unwrap();
        let progress = Arc::new(ProgressStore::new());
        let runner = Arc::new(PipelineRunner::new(
            Arc::new(ScriptedPlanner),
            Arc::new(ScriptedCoder),
            Arc::new(ScriptedDeployer),
            Arc::new(ScriptedBilling),
            FileEmitter::new(dir.path()),
            Arc::clone(&progress),
        ));
        let queue = crate::queue::JobQueue::new(RetentionPolicy::default());

        let good = job("gen_good");
        let mut bad = job("gen_bad");
        bad.mvs = MinimalSpec::default(); // fails validate_spec
        progress.start_run(&good, &good.app_id).unwrap();
        progress.start_run(&bad, &bad.app_id).unwrap();
        let good_id = queue.enqueue(good).await.unwrap();
        let bad_id = queue.enqueue(bad).await.unwrap();

        let pool = WorkerPool::start(1, Arc::clone(&queue), runner);
        wait_for_terminal(&progress, &["gen_good", "gen_bad"]).await;
        pool.shutdown(&queue).await;

        use crate::queue::JobState;
        assert_eq!(queue.job_state(good_id).await, Some(JobState::Completed));
        match queue.job_state(bad_id).await.unwrap() {
            JobState::Failed { error } => assert!(error.starts_with("validate_spec:")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn shutdown_drains_idle_workers() {
        let dir = tempdir().unwrap();
        let progress = Arc::new(ProgressStore::new());
        let runner = Arc::new(PipelineRunner::new(
            Arc::new(ScriptedPlanner),
            Arc::new(ScriptedCoder),
            Arc::new(ScriptedDeployer),
            Arc::new(ScriptedBilling),
            FileEmitter::new(dir.path()),
            progress,
        ));
        let queue = crate::queue::JobQueue::new(RetentionPolicy::default());
        let pool = WorkerPool::start(3, Arc::clone(&queue), runner);
        assert_eq!(pool.size(), 3);
        // Workers are all blocked on an empty queue; shutdown must not hang.
        pool.shutdown(&queue).await;
    }
}
