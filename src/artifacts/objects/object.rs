use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::codec;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use crate::errors::Result;
use bytes::Bytes;
use std::io::BufRead;

/// Serialize the object body (everything after the `"<type> <size>\0"` header)
pub trait Packable {
    fn serialize(&self) -> Result<Bytes>;
}

/// Parse an object body; the header has already been consumed
pub trait Unpackable {
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn display(&self) -> String;

    fn object_id(&self) -> Result<ObjectId> {
        Ok(codec::hash(self.object_type(), &self.serialize()?))
    }

    /// Framed canonical encoding, the bytes the object id is computed over
    fn encode(&self) -> Result<Bytes> {
        Ok(codec::frame(self.object_type(), &self.serialize()?))
    }
}

/// Any decoded object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectBox {
    Blob(Blob),
    Tree(Tree),
    Commit(Box<Commit>),
    Tag(Box<Tag>),
}

impl ObjectBox {
    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            ObjectBox::Blob(blob) => Some(blob),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            ObjectBox::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            ObjectBox::Commit(commit) => Some(commit),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            ObjectBox::Tag(tag) => Some(tag),
            _ => None,
        }
    }
}

impl Packable for ObjectBox {
    fn serialize(&self) -> Result<Bytes> {
        match self {
            ObjectBox::Blob(blob) => blob.serialize(),
            ObjectBox::Tree(tree) => tree.serialize(),
            ObjectBox::Commit(commit) => commit.serialize(),
            ObjectBox::Tag(tag) => tag.serialize(),
        }
    }
}

impl Object for ObjectBox {
    fn object_type(&self) -> ObjectType {
        match self {
            ObjectBox::Blob(_) => ObjectType::Blob,
            ObjectBox::Tree(_) => ObjectType::Tree,
            ObjectBox::Commit(_) => ObjectType::Commit,
            ObjectBox::Tag(_) => ObjectType::Tag,
        }
    }

    fn display(&self) -> String {
        match self {
            ObjectBox::Blob(blob) => blob.display(),
            ObjectBox::Tree(tree) => tree.display(),
            ObjectBox::Commit(commit) => commit.display(),
            ObjectBox::Tag(tag) => tag.display(),
        }
    }
}
