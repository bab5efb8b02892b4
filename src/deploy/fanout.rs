//! Parallel archive/upload fan-out (§4.7 step 4, §5 "Rust realisation").
//!
//! The teacher's `executor::ParallelExecutor` bounds concurrency with a
//! `Semaphore` and collects results over an `mpsc` channel while tracking a
//! dependency DAG. Deploy's archive/upload step has no dependency graph —
//! every entity's archive is independent — so this keeps the
//! semaphore-bounded-`tokio::spawn`-plus-`mpsc`-collector shape but drops
//! the DAG bookkeeping, and adds first-error-wins cancellation via
//! `tokio_util::sync::CancellationToken` (not present in the teacher, which
//! always runs every task to completion and reports all failures at once).

use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::{DeployError, Result};

const MAX_CONCURRENT_ARCHIVES: usize = 8;

pub struct FanoutItem<T> {
    pub key: String,
    pub value: T,
}

pub struct FanoutResult<T> {
    pub key: String,
    pub result: std::result::Result<T, String>,
}

/// Run `work` for each item in `items` concurrently (bounded by
/// `MAX_CONCURRENT_ARCHIVES`), cancelling remaining work on the first
/// error and returning it.
pub async fn run<T, I, F, Fut>(items: Vec<FanoutItem<I>>, work: F) -> Result<Vec<FanoutResult<T>>>
where
    T: Send + 'static,
    I: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + Clone + 'static,
    Fut: std::future::Future<Output = std::result::Result<T, String>> + Send,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_ARCHIVES));
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel::<FanoutResult<T>>(items.len());

    for item in items {
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let tx = tx.clone();
        let work = work.clone();

        tokio::spawn(async move {
            let permit = tokio::select! {
                permit = semaphore.acquire_owned() => permit,
                _ = cancel.cancelled() => return,
            };
            let Ok(_permit) = permit else { return };
            if cancel.is_cancelled() {
                return;
            }

            let result = work(item.value).await;
            if result.is_err() {
                cancel.cancel();
            }
            let _ = tx.send(FanoutResult { key: item.key, result }).await;
        });
    }
    drop(tx);

    let mut results = Vec::new();
    let mut first_error: Option<String> = None;
    while let Some(res) = rx.recv().await {
        if let Err(err) = &res.result {
            if first_error.is_none() {
                first_error = Some(format!("{}: {err}", res.key));
            }
        }
        results.push(res);
    }

    if let Some(err) = first_error {
        return Err(DeployError::Upstream(anyhow::anyhow!(err)));
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_items_returns_empty() {
        let results: Vec<FanoutResult<()>> = run(Vec::new(), |_: ()| async { Ok(()) }).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_all_succeed() {
        let items = vec![
            FanoutItem { key: "a".into(), value: 1 },
            FanoutItem { key: "b".into(), value: 2 },
        ];
        let results = run(items, |v: i32| async move { Ok::<i32, String>(v * 2) }).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_first_error_propagates() {
        let items = vec![
            FanoutItem { key: "a".into(), value: 1 },
            FanoutItem { key: "b".into(), value: 2 },
        ];
        let result = run(items, |v: i32| async move {
            if v == 1 {
                Err("boom".to_string())
            } else {
                Ok::<i32, String>(v)
            }
        })
        .await;
        assert!(result.is_err());
    }
}
