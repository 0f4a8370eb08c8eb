use log::{debug, warn};
use std::sync::Arc;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};

use crate::error::Error;
use crate::model::{Job, Outcome};
use crate::probe::Probe;

/// Fixed set of workers sharing one job queue and one completion queue.
///
/// The job queue is bounded: [`WorkerPool::submit`] waits for room when more
/// jobs are queued than it was sized for. Completions are unbounded so a
/// worker never waits on the consumer, which keeps a blocked submitter and
/// the workers from waiting on each other.
pub struct WorkerPool {
    jobs: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `size` workers with a job queue of `capacity` slots.
    ///
    /// Returns the pool and the receiving end of the completion queue.
    pub fn spawn<P: Probe>(
        size: usize,
        capacity: usize,
        prober: Arc<P>,
    ) -> (Self, mpsc::UnboundedReceiver<Outcome>) {
        let (jobs_tx, jobs_rx) = mpsc::channel(capacity.max(1));
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));

        let workers = (1..=size.max(1))
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    Arc::clone(&jobs_rx),
                    results_tx.clone(),
                    Arc::clone(&prober),
                ))
            })
            .collect();

        (
            Self {
                jobs: jobs_tx,
                workers,
            },
            results_rx,
        )
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queues `job`, waiting while the queue is full.
    pub async fn submit(&self, job: Job) -> Result<(), Error> {
        self.jobs.send(job).await.map_err(|_| Error::PoolClosed)
    }
}

async fn worker<P: Probe>(
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    results: mpsc::UnboundedSender<Outcome>,
    prober: Arc<P>,
) {
    debug!("worker {id} ready to receive work");

    loop {
        let job = jobs.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        debug!("worker {id} now processing: {}", job.domain);
        let outcome = prober.probe(&job).await;

        if results.send(outcome).is_err() {
            warn!("worker {id}: completion queue closed, dropping result");
            break;
        }
    }

    debug!("worker {id} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProbe;
    use std::{collections::HashSet, time::Duration};

    fn job(domain: &str) -> Job {
        Job {
            domain: domain.to_string(),
            endpoint: "/".to_string(),
            expected_status: 200,
        }
    }

    #[tokio::test]
    async fn test_two_workers_complete_five_jobs() {
        let prober = Arc::new(ScriptedProbe::with_delay(Duration::from_millis(20)));
        let domains = ["a.test", "b.test", "c.test", "d.test", "e.test"];
        for domain in &domains {
            prober.set_status(domain, 200);
        }

        let (pool, mut results) = WorkerPool::spawn(2, domains.len(), Arc::clone(&prober));
        assert_eq!(pool.size(), 2);

        for domain in &domains {
            pool.submit(job(domain)).await.unwrap();
        }

        let mut seen = HashSet::new();
        for _ in 0..domains.len() {
            let outcome = results.recv().await.expect("completion queue closed early");
            assert!(outcome.ok);
            seen.insert(outcome.domain);
        }

        assert_eq!(seen.len(), domains.len());
        assert!(prober.peak() <= 2, "more than two probes ran at once");
    }

    #[tokio::test]
    async fn test_submission_waits_for_room() {
        let prober = Arc::new(ScriptedProbe::with_delay(Duration::from_millis(5)));
        let (pool, mut results) = WorkerPool::spawn(1, 1, Arc::clone(&prober));

        for i in 0..4 {
            pool.submit(job(&format!("{i}.test"))).await.unwrap();
        }

        for _ in 0..4 {
            let outcome = results.recv().await.unwrap();
            assert!(!outcome.ok, "unscripted domains are unreachable");
        }
        assert_eq!(prober.calls(), 4);
    }

    #[tokio::test]
    async fn test_dropping_pool_stops_workers() {
        let prober = Arc::new(ScriptedProbe::default());
        let (pool, mut results) = WorkerPool::spawn(3, 1, prober);

        pool.submit(job("a.test")).await.unwrap();
        drop(pool);

        assert_eq!(results.recv().await.unwrap().domain, "a.test");
        assert!(results.recv().await.is_none());
    }
}
