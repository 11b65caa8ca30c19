//! Canonical object framing and hashing
//!
//! Every object is stored and hashed as `"<type> <size>\0<body>"`. Two byte-identical
//! encodings always produce the same digest, which is what makes the store
//! content-addressed.

use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{Object, ObjectBox, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use crate::errors::{Error, Result};
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::{Cursor, Read};

pub fn encode(object: &impl Object) -> Result<Bytes> {
    object.encode()
}

/// Prefix a body with its object header
pub fn frame(object_type: ObjectType, body: &[u8]) -> Bytes {
    let header = object_type.header(body.len());
    let mut framed = Vec::with_capacity(header.len() + body.len());
    framed.extend_from_slice(header.as_bytes());
    framed.extend_from_slice(body);

    Bytes::from(framed)
}

/// Decode a body of a known type
pub fn decode(object_type: ObjectType, body: &[u8]) -> Result<ObjectBox> {
    let reader = Cursor::new(body);

    Ok(match object_type {
        ObjectType::Blob => ObjectBox::Blob(Blob::deserialize(reader)?),
        ObjectType::Tree => ObjectBox::Tree(Tree::deserialize(reader)?),
        ObjectType::Commit => ObjectBox::Commit(Box::new(Commit::deserialize(reader)?)),
        ObjectType::Tag => ObjectBox::Tag(Box::new(Tag::deserialize(reader)?)),
    })
}

/// Decode a framed encoding, checking the declared size against the body
pub fn decode_framed(bytes: &[u8]) -> Result<ObjectBox> {
    let mut reader = Cursor::new(bytes);
    let header = ObjectType::parse_object_header(&mut reader)?;

    let mut body = Vec::with_capacity(header.size);
    reader.read_to_end(&mut body)?;
    if body.len() != header.size {
        return Err(Error::malformed(
            "object",
            format!("header declares {} bytes, found {}", header.size, body.len()),
        ));
    }

    decode(header.object_type, &body)
}

/// SHA-1 of an already framed encoding
pub fn digest(bytes: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(bytes);

    ObjectId::from_raw(hasher.finalize().into())
}

/// Frame and hash a body without materializing the framed copy
pub fn hash(object_type: ObjectType, body: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(object_type.header(body.len()).as_bytes());
    hasher.update(body);

    ObjectId::from_raw(hasher.finalize().into())
}
