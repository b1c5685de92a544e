//! Fan-out / fan-in over independent units of I/O.
//!
//! Each item gets its own tokio task. Results come back in input order regardless of completion
//! order. The first failure is returned and dropping the `JoinSet` aborts every sibling task that
//! is still running.

use crate::error::Result;
use std::future::Future;
use tokio::task::JoinSet;

pub async fn fan_out<I, T, F, Fut>(items: I, f: F) -> Result<Vec<T>>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let mut set = JoinSet::new();
    let mut remaining = 0usize;

    for (idx, item) in items.into_iter().enumerate() {
        let fut = f(item);
        set.spawn(async move { (idx, fut.await) });
        remaining += 1;
    }

    let mut results: Vec<Option<T>> = (0..remaining).map(|_| None).collect();

    while let Some(joined) = set.join_next().await {
        let (idx, result) = joined?;
        results[idx] = Some(result?);
    }

    Ok(results.into_iter().flatten().collect())
}
