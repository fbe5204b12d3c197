use futures::{
    future::ready,
    stream::{self, BoxStream},
    Stream, StreamExt,
};

use crate::store::StoreError;

/// Turns a stream of snapshot results into plain snapshots. A failure is
/// logged and becomes one final empty snapshot.
pub fn snapshots<S, T>(source: S, context: &'static str) -> BoxStream<'static, Vec<T>>
where
    S: Stream<Item = Result<Vec<T>, StoreError>> + Send + 'static,
    T: Send + 'static,
{
    source
        .scan(false, move |failed, next| {
            if *failed {
                return ready(None);
            }
            ready(Some(match next {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::error!("{} subscription failed: {}", context, e);
                    *failed = true;
                    Vec::new()
                }
            }))
        })
        .boxed()
}

/// The stream served when a subscription could not be opened at all.
pub fn failed<T: Send + 'static>(context: &'static str, err: &StoreError) -> BoxStream<'static, Vec<T>> {
    tracing::error!("Could not subscribe to {}: {}", context, err);
    stream::once(ready(Vec::new())).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failure_ends_with_an_empty_snapshot() {
        let source = stream::iter(vec![
            Ok(vec![1, 2]),
            Err(StoreError::Unavailable("gone".into())),
            Ok(vec![3]),
        ]);
        let seen: Vec<Vec<i32>> = snapshots(source, "numbers").collect().await;
        assert_eq!(seen, vec![vec![1, 2], vec![]]);
    }

    #[tokio::test]
    async fn failed_subscription_yields_one_empty_snapshot() {
        let seen: Vec<Vec<i32>> = failed("numbers", &StoreError::Backend("x".into()))
            .collect()
            .await;
        assert_eq!(seen, vec![Vec::<i32>::new()]);
    }
}
