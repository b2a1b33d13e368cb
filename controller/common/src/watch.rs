use crate::api::EdgeObject;
use crate::predicate::FirstUpdateFilter;
use crate::scheduler::{ResourceIndex, Store};
use color_eyre::{eyre::eyre, Result};
use flume::Sender;
use futures::StreamExt;
use kube::{api::ListParams, Api, Resource};
use kube_runtime::watcher::{watcher, Event};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, trace};

/// A change to one watched object. Updates carry the previously seen version.
#[derive(Debug, Clone)]
pub enum Notification<K> {
    Create(K),
    Update { old: K, new: K },
    Delete(K),
}

impl<K: Resource> Notification<K> {
    pub fn index(&self) -> ResourceIndex<K> {
        match self {
            Notification::Create(obj) | Notification::Delete(obj) => obj.into(),
            Notification::Update { new, .. } => new.into(),
        }
    }
}

fn applied<K: Resource + Clone>(cache: &Store<K>, obj: K) -> Notification<K> {
    match cache.insert((&obj).into(), obj.clone()) {
        Some(old) => Notification::Update { old, new: obj },
        None => Notification::Create(obj),
    }
}

/// Turn a watcher event into notifications, keeping `cache` in sync.
pub fn notifications<K: Resource + Clone>(cache: &Store<K>, event: Event<K>) -> Vec<Notification<K>> {
    match event {
        Event::Applied(obj) => vec![applied(cache, obj)],
        Event::Deleted(obj) => {
            cache.remove(&ResourceIndex::from(&obj));
            vec![Notification::Delete(obj)]
        }
        Event::Restarted(objs) => {
            let seen: HashSet<ResourceIndex<K>> = objs.iter().map(ResourceIndex::from).collect();
            let mut result: Vec<_> = objs.into_iter().map(|obj| applied(cache, obj)).collect();
            let stale: Vec<_> = cache
                .iter()
                .filter(|e| !seen.contains(e.key()))
                .map(|e| e.key().clone())
                .collect();
            for idx in stale {
                if let Some((_, old)) = cache.remove(&idx) {
                    result.push(Notification::Delete(old));
                }
            }
            result
        }
    }
}

/// Watch `api` and enqueue the index of every object whose notification
/// passes `filter`.
#[tracing::instrument(skip_all)]
pub async fn reflector<K>(
    api: Api<K>,
    list_params: ListParams,
    cache: Arc<Store<K>>,
    filter: FirstUpdateFilter,
    queue: Sender<ResourceIndex<K>>,
) -> Result<()>
where
    K: Resource + EdgeObject + Clone + Debug + Send + Sync + DeserializeOwned + 'static,
    K::DynamicType: Eq + Hash + Clone + Default,
{
    let mut watcher = watcher(api, list_params).boxed();
    loop {
        match watcher.next().await {
            Some(Ok(ev)) => {
                for n in notifications(&cache, ev) {
                    let idx = n.index();
                    if filter.admit(&n) {
                        trace!(index =? idx, "Enqueue");
                        queue.send_async(idx).await?;
                    } else {
                        trace!(index =? idx, "Filtered");
                    }
                }
            }
            Some(Err(e)) => {
                error!(error =? e, "Watcher throw a error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            None => break Err(eyre!("Watcher stop unexpected!")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::device::DeviceSpec;
    use crate::api::Device;

    fn device(name: &str) -> Device {
        let mut dev = Device::new(name, DeviceSpec::default());
        dev.metadata.namespace = Some("default".to_owned());
        dev
    }

    #[test]
    fn applied_twice_is_an_update() {
        let cache = Store::default();
        let first = notifications(&cache, Event::Applied(device("boiler")));
        assert!(matches!(first[..], [Notification::Create(_)]));
        let second = notifications(&cache, Event::Applied(device("boiler")));
        assert!(matches!(second[..], [Notification::Update { .. }]));
        assert_eq!(second[0].index(), ResourceIndex::new("default", "boiler"));
    }

    #[test]
    fn restart_drops_objects_missing_from_relist() {
        let cache = Store::default();
        notifications(&cache, Event::Applied(device("boiler")));
        notifications(&cache, Event::Applied(device("pump")));
        let ns = notifications(&cache, Event::Restarted(vec![device("pump"), device("fan")]));
        assert_eq!(ns.len(), 3);
        assert!(matches!(ns[0], Notification::Update { .. }));
        assert!(matches!(ns[1], Notification::Create(_)));
        match &ns[2] {
            Notification::Delete(d) => assert_eq!(d.metadata.name.as_deref(), Some("boiler")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn deleted_leaves_cache() {
        let cache = Store::default();
        notifications(&cache, Event::Applied(device("boiler")));
        let ns = notifications(&cache, Event::Deleted(device("boiler")));
        assert!(matches!(ns[..], [Notification::Delete(_)]));
        assert!(cache.is_empty());
    }
}
