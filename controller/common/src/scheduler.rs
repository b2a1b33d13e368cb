use async_trait::async_trait;
use color_eyre::Result;
use dashmap::DashMap;
use flume::{Receiver, Sender};
use futures::StreamExt;
use kube::Resource;
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace};

#[derive(Serialize)]
pub struct ResourceIndex<K> {
    pub namespace: String,
    pub name: String,
    #[serde(skip)]
    pub api: PhantomData<K>,
}

impl<K> ResourceIndex<K> {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        ResourceIndex {
            namespace: namespace.into(),
            name: name.into(),
            api: PhantomData,
        }
    }
}

impl<K> Clone for ResourceIndex<K> {
    fn clone(&self) -> Self {
        ResourceIndex::new(self.namespace.clone(), self.name.clone())
    }
}

impl<K> Hash for ResourceIndex<K> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.name.hash(state);
    }
}

impl<K> PartialEq for ResourceIndex<K> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.namespace == other.namespace
    }
}

impl<K> Eq for ResourceIndex<K> {}

impl<K> Debug for ResourceIndex<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceIndex")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .finish()
    }
}

impl<K> From<&K> for ResourceIndex<K>
where
    K: Resource,
{
    fn from(res: &K) -> Self {
        ResourceIndex::new(
            res.meta().namespace.clone().unwrap_or_default(),
            res.meta().name.clone().unwrap_or_default(),
        )
    }
}

/// Last seen version of every watched object, keyed by index.
pub type Store<K> = DashMap<ResourceIndex<K>, K>;

/// What the scheduler should do with an object after a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do until the object changes again.
    Await,
    Requeue,
    RequeueAfter(Duration),
}

#[async_trait]
pub trait Reconcile<K>: Send + Sync {
    async fn reconcile(&self, index: &ResourceIndex<K>) -> Result<Action>;
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Maximum number of reconciliations in flight.
    pub workers: usize,
    /// Delay before an object whose reconciliation failed is retried.
    pub error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            workers: 4,
            error_backoff: Duration::from_secs(10),
        }
    }
}

fn schedule<K: Send + 'static>(action: Action, index: ResourceIndex<K>, queue: Sender<ResourceIndex<K>>) {
    let delay = match action {
        Action::Await => return,
        Action::Requeue => Duration::ZERO,
        Action::RequeueAfter(d) => d,
    };
    trace!(index =? index, delay =? delay, "requeue");
    tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Err(e) = queue.send_async(index).await {
            error!(error =% e, "Work queue closed, dropping requeue")
        }
    });
}

/// Drain `queue`, reconciling each index with `reconciler` and requeueing it
/// according to the returned [`Action`]. Errors are logged and retried after
/// `config.error_backoff`; they never stop the workers.
#[tracing::instrument(skip_all)]
pub async fn run_workers<K, R>(
    reconciler: Arc<R>,
    queue: Receiver<ResourceIndex<K>>,
    requeue: Sender<ResourceIndex<K>>,
    config: WorkerConfig,
) -> Result<()>
where
    K: Send + Sync + 'static,
    R: Reconcile<K> + 'static,
{
    queue
        .into_stream()
        .for_each_concurrent(config.workers.max(1), |index| {
            let reconciler = reconciler.clone();
            let requeue = requeue.clone();
            async move {
                let action = match reconciler.reconcile(&index).await {
                    Ok(action) => action,
                    Err(e) => {
                        error!(index =? index, error =? e, "Reconcile failed");
                        Action::RequeueAfter(config.error_backoff)
                    }
                };
                debug!(index =? index, action =? action, "Reconcile done");
                schedule(action, index, requeue);
            }
        })
        .await;
    Ok(())
}
