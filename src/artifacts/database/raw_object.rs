use crate::artifacts::objects::codec;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::{ObjectHeader, ObjectType};
use crate::errors::Result;
use bytes::Bytes;
use derive_new::new;

/// An object body as stored, before decoding
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct RawObject {
    pub oid: ObjectId,
    pub object_type: ObjectType,
    pub data: Bytes,
}

impl RawObject {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn header(&self) -> ObjectHeader {
        ObjectHeader {
            object_type: self.object_type,
            size: self.data.len(),
        }
    }

    pub fn decode(&self) -> Result<ObjectBox> {
        codec::decode(self.object_type, &self.data)
    }
}
