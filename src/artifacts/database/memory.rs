use crate::artifacts::database::backend::OdbBackend;
use crate::artifacts::database::raw_object::RawObject;
use crate::artifacts::objects::object_id::{ObjectId, OidPrefix};
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::Result;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Objects kept in a map; nothing touches the disk
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: RwLock<HashMap<ObjectId, (ObjectType, Bytes)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }

    // a poisoned lock still guards a consistent map: every insert is a single call
    fn objects(&self) -> RwLockReadGuard<'_, HashMap<ObjectId, (ObjectType, Bytes)>> {
        self.objects.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn objects_mut(&self) -> RwLockWriteGuard<'_, HashMap<ObjectId, (ObjectType, Bytes)>> {
        self.objects.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl OdbBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn exists(&self, oid: &ObjectId) -> Result<bool> {
        Ok(self.objects().contains_key(oid))
    }

    fn read(&self, oid: &ObjectId) -> Result<Option<RawObject>> {
        Ok(self
            .objects()
            .get(oid)
            .map(|(object_type, data)| RawObject::new(*oid, *object_type, data.clone())))
    }

    fn prefix_matches(&self, prefix: &OidPrefix) -> Result<Vec<ObjectId>> {
        Ok(self
            .objects()
            .keys()
            .filter(|oid| oid.starts_with(prefix))
            .copied()
            .collect())
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn write(&self, oid: &ObjectId, object_type: ObjectType, data: &[u8]) -> Result<()> {
        self.objects_mut()
            .entry(*oid)
            .or_insert_with(|| (object_type, Bytes::copy_from_slice(data)));

        Ok(())
    }
}
