//! Annotated tag object
//!
//! ```text
//! object <target-sha>
//! type <target-type>
//! tag <name>
//! tagger <name> <email> <timestamp> <timezone>
//!
//! <message>
//! ```

use crate::artifacts::objects::commit::{header_text, parse_headers, split_message, write_header};
use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::signature::Signature;
use crate::errors::{Error, Result};
use bytes::Bytes;
use std::borrow::Cow;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    target: ObjectId,
    target_type: ObjectType,
    name: String,
    /// Very old tags carry no tagger line
    tagger: Option<Signature>,
    message: Bytes,
}

impl Tag {
    pub fn new(
        target: ObjectId,
        target_type: ObjectType,
        name: String,
        tagger: Option<Signature>,
        message: impl Into<Bytes>,
    ) -> Self {
        Tag {
            target,
            target_type,
            name,
            tagger,
            message: message.into(),
        }
    }

    pub fn target(&self) -> &ObjectId {
        &self.target
    }

    pub fn target_type(&self) -> ObjectType {
        self.target_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tagger(&self) -> Option<&Signature> {
        self.tagger.as_ref()
    }

    /// Message for display; bytes that are not UTF-8 are replaced
    pub fn message(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.message)
    }

    pub fn message_bytes(&self) -> &[u8] {
        &self.message
    }

    fn render(&self) -> Vec<u8> {
        let mut out = format!("object {}\ntype {}\n", self.target, self.target_type).into_bytes();
        write_header(&mut out, "tag", self.name.as_bytes());
        if let Some(tagger) = &self.tagger {
            out.extend_from_slice(b"tagger ");
            tagger.write_to(&mut out);
            out.push(b'\n');
        }

        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }
}

impl Packable for Tag {
    fn serialize(&self) -> Result<Bytes> {
        Ok(Bytes::from(self.render()))
    }
}

impl Unpackable for Tag {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;

        let (header_block, message) = split_message(&content);
        let headers = parse_headers("tag", header_block)?;
        let field = |name: &str| {
            headers
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_ref())
        };
        let text_field = |name: &'static str| match field(name) {
            Some(value) => header_text("tag", name, value),
            None => Err(Error::malformed("tag", format!("missing {name} line"))),
        };

        let target = text_field("object").and_then(|oid| {
            ObjectId::try_parse(oid)
                .map_err(|_| Error::malformed("tag", format!("bad object id {oid}")))
        })?;
        let target_type = ObjectType::try_from(text_field("type")?)?;
        let name = text_field("tag")?.to_string();
        let tagger = field("tagger").map(Signature::parse_bytes).transpose()?;

        let message = Bytes::copy_from_slice(message);

        Ok(Tag::new(target, target_type, name, tagger, message))
    }
}

impl Object for Tag {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn display(&self) -> String {
        String::from_utf8_lossy(&self.render()).into_owned()
    }
}
