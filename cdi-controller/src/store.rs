use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// The minimal interface the reconcile logic needs from the API server: `{Get, List, Create,
/// Update, Patch, Delete}` (spec.md §9 REDESIGN FLAGS, "Controller-runtime event plumbing" —
/// "the core state machine should accept a minimal interface ... so it can be exercised
/// in-memory with no network"). `EventRecorder` and `WorkqueueRequeue` are modeled separately by
/// [`crate::events::Events`] and the return value of a reconcile function, respectively.
#[async_trait]
pub(crate) trait Store<K>: Send + Sync
where
    K: Resource + Clone + Send + Sync + 'static,
{
    /// fetch one object by name, `None` if absent
    async fn get(&self, name: &str) -> kube::Result<Option<K>>;
    /// list every object this store currently holds
    async fn list(&self) -> kube::Result<Vec<K>>;
    /// create a new object, failing if one of the same name already exists
    async fn create(&self, object: K) -> kube::Result<K>;
    /// replace an object's status subresource
    async fn patch(&self, name: &str, patch: &K) -> kube::Result<K>;
    /// delete an object by name; a no-op if it is already absent
    async fn delete(&self, name: &str) -> kube::Result<()>;
}

/// A [`Store`] backed by a real `kube::Api`, used outside tests
pub(crate) struct KubeStore<K> {
    /// the underlying namespaced or cluster-scoped API handle
    api: Api<K>,
    /// field manager stamped on every server-side-apply write
    field_manager: &'static str,
}

impl<K> KubeStore<K> {
    /// Wrap an `Api<K>` as a [`Store`]
    pub(crate) fn new(api: Api<K>, field_manager: &'static str) -> Self {
        Self { api, field_manager }
    }
}

#[async_trait]
impl<K> Store<K> for KubeStore<K>
where
    K: Resource
        + Clone
        + Serialize
        + DeserializeOwned
        + std::fmt::Debug
        + Send
        + Sync
        + 'static,
    K::DynamicType: Default,
{
    async fn get(&self, name: &str) -> kube::Result<Option<K>> {
        match self.api.get(name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn list(&self) -> kube::Result<Vec<K>> {
        Ok(self.api.list(&ListParams::default()).await?.items)
    }

    async fn create(&self, object: K) -> kube::Result<K> {
        self.api.create(&PostParams::default(), &object).await
    }

    async fn patch(&self, name: &str, patch: &K) -> kube::Result<K> {
        self.api
            .patch(
                name,
                &PatchParams::apply(self.field_manager),
                &Patch::Apply(patch),
            )
            .await
    }

    async fn delete(&self, name: &str) -> kube::Result<()> {
        match self.api.delete(name, &Default::default()).await {
            Ok(_) | Err(kube::Error::Api(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// An in-memory [`Store`], used to exercise reconcile logic without a real API server
/// (spec.md §9 REDESIGN FLAGS, §8 "implemented ... using an in-memory fake store")
pub(crate) struct FakeStore<K> {
    /// objects keyed by name
    objects: Mutex<BTreeMap<String, K>>,
}

impl<K> Default for FakeStore<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<K: Clone> FakeStore<K> {
    /// Seed the store with a pre-existing object, as scenario tests do to set up fixtures
    #[cfg(test)]
    pub(crate) fn seed(&self, name: impl Into<String>, object: K) {
        let _prev = self
            .objects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(name.into(), object);
    }
}

#[async_trait]
impl<K> Store<K> for FakeStore<K>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    async fn get(&self, name: &str) -> kube::Result<Option<K>> {
        Ok(self
            .objects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .cloned())
    }

    async fn list(&self) -> kube::Result<Vec<K>> {
        Ok(self
            .objects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }

    async fn create(&self, object: K) -> kube::Result<K> {
        let name = object.name_any();
        let _prev = self
            .objects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(name, object.clone());
        Ok(object)
    }

    async fn patch(&self, name: &str, patch: &K) -> kube::Result<K> {
        let _prev = self
            .objects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(name.to_owned(), patch.clone());
        Ok(patch.clone())
    }

    async fn delete(&self, name: &str) -> kube::Result<()> {
        let _prev = self
            .objects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{FakeStore, Store};
    use cdi_api::v1beta1::{DataVolume, DataVolumeSource, DataVolumeSpec};

    fn dv(name: &str) -> DataVolume {
        let mut dv = DataVolume::new(
            name,
            DataVolumeSpec {
                source: DataVolumeSource::Blank {},
                pvc: None,
                storage: None,
                content_type: None,
                checkpoints: None,
                final_checkpoint: None,
                priority_class_name: None,
                preallocation: None,
            },
        );
        dv.metadata.namespace = Some("default".to_owned());
        dv
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store: FakeStore<DataVolume> = FakeStore::default();
        let created = store.create(dv("test-dv")).await.unwrap();
        let fetched = store.get("test-dv").await.unwrap().unwrap();
        assert_eq!(created.metadata.name, fetched.metadata.name);
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let store: FakeStore<DataVolume> = FakeStore::default();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store: FakeStore<DataVolume> = FakeStore::default();
        let _created = store.create(dv("test-dv")).await.unwrap();
        store.delete("test-dv").await.unwrap();
        store.delete("test-dv").await.unwrap();
        assert!(store.get("test-dv").await.unwrap().is_none());
    }
}
