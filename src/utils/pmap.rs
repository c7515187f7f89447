use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Applies an async transform to each element with at most `concurrency`
/// transforms in flight (`None` = unbounded).
///
/// Output order always matches input order regardless of completion order.
/// The first failure aborts the remaining in-flight tasks and propagates.
pub async fn pmap<I, T, R, F, Fut>(items: I, concurrency: Option<usize>, mapper: F) -> Result<Vec<R>>
where
    I: IntoIterator<Item = T>,
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    if let Some(limit) = concurrency {
        anyhow::ensure!(limit >= 1, "concurrency must be at least 1, got {}", limit);
    }

    let mapper = Arc::new(mapper);
    let semaphore = concurrency.map(|limit| Arc::new(Semaphore::new(limit)));
    let mut set: JoinSet<(usize, Result<R>)> = JoinSet::new();
    let mut total = 0usize;

    for (index, item) in items.into_iter().enumerate() {
        let mapper = Arc::clone(&mapper);
        let semaphore = semaphore.clone();
        total += 1;

        set.spawn(async move {
            let _permit = match semaphore {
                // Semaphore is never closed, acquire only fails after close
                Some(sem) => sem.acquire_owned().await.ok(),
                None => None,
            };
            (index, mapper(item).await)
        });
    }

    let mut slots: Vec<Option<R>> = Vec::with_capacity(total);
    slots.resize_with(total, || None);

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, Ok(value))) => slots[index] = Some(value),
            Ok((_, Err(e))) => {
                set.abort_all();
                return Err(e);
            }
            Err(e) => {
                set.abort_all();
                return Err(anyhow::anyhow!("pmap worker panicked: {}", e));
            }
        }
    }

    // Every slot is filled once all tasks joined without error
    Ok(slots.into_iter().map(|slot| slot.unwrap()).collect())
}
