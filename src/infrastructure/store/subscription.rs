use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde::de::DeserializeOwned;
use tokio::{sync::mpsc, task::JoinHandle};

use super::{decode_all, Document, StoreError};

const SNAPSHOT_BUFFER: usize = 16;

pub type SnapshotResult = Result<Vec<Document>, StoreError>;
pub type SnapshotSender = mpsc::Sender<SnapshotResult>;

/// A live query: a stream of full snapshots plus ownership of the task that
/// produces them. Dropping the subscription (or calling [`cancel`]) stops the
/// task.
///
/// [`cancel`]: Subscription::cancel
pub struct Subscription {
    receiver: mpsc::Receiver<SnapshotResult>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Spawns `producer` with the sending half of a fresh snapshot channel.
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(SnapshotSender) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(SNAPSHOT_BUFFER);
        let task = tokio::spawn(producer(sender));
        Subscription {
            receiver,
            task: Some(task),
        }
    }

    pub fn cancel(mut self) {
        self.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.abort();
    }
}

impl Stream for Subscription {
    type Item = SnapshotResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// A [`Subscription`] whose snapshots are decoded into records of type `T`.
pub struct LiveQuery<T> {
    subscription: Subscription,
    _record: PhantomData<fn() -> T>,
}

impl<T> LiveQuery<T> {
    pub fn new(subscription: Subscription) -> Self {
        LiveQuery {
            subscription,
            _record: PhantomData,
        }
    }

    pub fn cancel(self) {
        self.subscription.cancel();
    }
}

impl<T: DeserializeOwned> Stream for LiveQuery<T> {
    type Item = Result<Vec<T>, StoreError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.subscription)
            .poll_next(cx)
            .map(|next| next.map(|snapshot| snapshot.map(|docs| decode_all(&docs))))
    }
}
