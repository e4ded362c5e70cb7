//! Fixed-size worker pools fed by a shared job channel.
//!
//! Each worker loops: receive a job, run it, send the result. A worker exits
//! when the job channel closes or the result channel is dropped. Jobs and
//! results are moved by value, so ownership passes cleanly between stages.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, Instrument};

/// Spawn `count` workers draining `jobs` into `results` through `work`.
///
/// `count` is clamped to at least one. The returned handles finish once
/// every sender of `jobs` has been dropped and the channel is drained.
pub fn spawn_workers<T, R, F, Fut>(
    name: &'static str,
    count: usize,
    jobs: mpsc::Receiver<T>,
    results: mpsc::Sender<R>,
    work: F,
) -> Vec<JoinHandle<()>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let jobs = Arc::new(Mutex::new(jobs));
    let work = Arc::new(work);

    (0..count.max(1))
        .map(|worker| {
            let jobs = Arc::clone(&jobs);
            let results = results.clone();
            let work = Arc::clone(&work);
            let span = tracing::debug_span!("worker", pool = name, worker);

            tokio::spawn(
                async move {
                    loop {
                        // Hold the lock only while waiting for the next job.
                        let job = { jobs.lock().await.recv().await };
                        let Some(job) = job else { break };

                        let result = work(job).await;
                        if results.send(result).await.is_err() {
                            break;
                        }
                    }
                    debug!("worker exiting");
                }
                .instrument(span),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn every_job_produces_one_result() {
        let (job_tx, job_rx) = mpsc::channel(4);
        let (res_tx, mut res_rx) = mpsc::channel(4);

        let handles = spawn_workers("double", 3, job_rx, res_tx, |n: u32| async move { n * 2 });

        tokio::spawn(async move {
            for n in 0..20u32 {
                job_tx.send(n).await.unwrap();
            }
        });

        let mut out = Vec::new();
        while let Some(v) = res_rx.recv().await {
            out.push(v);
        }
        out.sort_unstable();
        assert_eq!(out, (0..20u32).map(|n| n * 2).collect::<Vec<_>>());

        for h in handles {
            h.await.unwrap();
        }
    }

    #[tokio::test]
    async fn workers_run_concurrently() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (job_tx, job_rx) = mpsc::channel(8);
        let (res_tx, mut res_rx) = mpsc::channel(8);

        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        spawn_workers("sleepy", 4, job_rx, res_tx, move |_: ()| {
            let (a, p) = (Arc::clone(&a), Arc::clone(&p));
            async move {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                a.fetch_sub(1, Ordering::SeqCst);
            }
        });

        for _ in 0..8 {
            job_tx.send(()).await.unwrap();
        }
        drop(job_tx);
        while res_rx.recv().await.is_some() {}

        assert!(peak.load(Ordering::SeqCst) > 1);
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn zero_workers_is_clamped_to_one() {
        let (job_tx, job_rx) = mpsc::channel(1);
        let (res_tx, mut res_rx) = mpsc::channel(1);
        let handles = spawn_workers("one", 0, job_rx, res_tx, |s: &'static str| async move { s });
        assert_eq!(handles.len(), 1);

        job_tx.send("hi").await.unwrap();
        assert_eq!(res_rx.recv().await, Some("hi"));
    }
}
