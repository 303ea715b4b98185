/// In-memory object store used by tests and local development.
///
/// Keys are held in a sorted map; the listing cursor is the last key of the
/// previous page, making pagination deterministic.
use crate::error::Result;
use crate::storage::{
    AssetStore, ListPage, ObjectBody, ObjectHead, ObjectStore, ObjectSummary,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    metadata: HashMap<String, String>,
    last_modified: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                metadata: metadata.clone(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<ObjectBody>> {
        Ok(self.objects.lock().unwrap().get(key).map(|obj| ObjectBody {
            data: obj.data.clone(),
            content_type: Some(obj.content_type.clone()),
            metadata: obj.metadata.clone(),
            last_modified: Some(obj.last_modified),
        }))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectHead>> {
        Ok(self.objects.lock().unwrap().get(key).map(|obj| ObjectHead {
            content_type: Some(obj.content_type.clone()),
            size: obj.data.len() as u64,
            last_modified: Some(obj.last_modified),
        }))
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>, limit: usize) -> Result<ListPage> {
        let objects = self.objects.lock().unwrap();

        let start = match cursor {
            Some(c) => Bound::Excluded(c.to_string()),
            None => Bound::Unbounded,
        };

        let mut page = Vec::new();
        let mut has_more = false;
        for (key, obj) in objects.range((start, Bound::Unbounded)) {
            if !key.starts_with(prefix) {
                continue;
            }
            if page.len() == limit {
                has_more = true;
                break;
            }
            page.push(ObjectSummary {
                key: key.clone(),
                size: obj.data.len() as u64,
                last_modified: Some(obj.last_modified),
                metadata: Some(obj.metadata.clone()),
            });
        }

        let cursor = if has_more {
            page.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            objects: page,
            cursor,
            has_more,
        })
    }
}

#[derive(Default)]
pub struct MemoryAssetStore {
    assets: HashMap<String, Bytes>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, name: &str, data: Bytes) -> Self {
        self.assets.insert(name.to_string(), data);
        self
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn fetch(&self, name: &str) -> Result<Option<Bytes>> {
        Ok(self.assets.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> MemoryObjectStore {
        let store = MemoryObjectStore::new();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            store
                .put(
                    &format!("event-photos/{name}"),
                    Bytes::from_static(b"data"),
                    "image/jpeg",
                    &HashMap::new(),
                )
                .await
                .unwrap();
        }
        store
            .put("other/z.jpg", Bytes::from_static(b"x"), "image/jpeg", &HashMap::new())
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_list_respects_prefix_and_cursor() {
        let store = seeded().await;

        let page = store.list("event-photos/", None, 2).await.unwrap();
        assert_eq!(page.objects.len(), 2);
        assert!(page.has_more);
        let cursor = page.cursor.unwrap();

        let rest = store
            .list("event-photos/", Some(&cursor), 2)
            .await
            .unwrap();
        assert_eq!(rest.objects.len(), 1);
        assert!(!rest.has_more);
        assert_eq!(rest.objects[0].key, "event-photos/c.jpg");
    }

    #[tokio::test]
    async fn test_get_and_head_roundtrip() {
        let store = seeded().await;
        let body = store.get("event-photos/a.jpg").await.unwrap().unwrap();
        assert_eq!(body.data.as_ref(), b"data");

        let head = store.head("event-photos/a.jpg").await.unwrap().unwrap();
        assert_eq!(head.size, 4);

        assert!(store.get("event-photos/missing.jpg").await.unwrap().is_none());
    }
}
