//! Git commit object
//!
//! Commits represent snapshots of the repository at specific points in time.
//!
//! ## Format
//!
//! On disk:
//! ```text
//! commit <size>\0
//! tree <tree-sha>
//! parent <parent-sha>
//! author <name> <email> <timestamp> <timezone>
//! committer <name> <email> <timestamp> <timezone>
//! encoding <charset>
//! gpgsig -----BEGIN PGP SIGNATURE-----
//!  <continuation lines start with a space>
//!
//! <commit message>
//! ```
//!
//! Everything after the first blank line is the message and is kept byte for byte.

use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::signature::Signature;
use crate::errors::{Error, Result};
use bytes::Bytes;
use std::borrow::Cow;
use std::io::BufRead;

/// Slim representation of a commit
///
/// Only what history traversal needs: the graph edges and the committer time.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SlimCommit {
    pub oid: ObjectId,
    pub parents: Vec<ObjectId>,
    /// Committer time, seconds since the epoch
    pub time: i64,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    tree: ObjectId,
    /// Empty for a root commit, more than one for a merge
    parents: Vec<ObjectId>,
    author: Signature,
    committer: Signature,
    encoding: Option<String>,
    /// Headers this crate does not interpret, such as `gpgsig` or `mergetag`
    extra_headers: Vec<(String, Bytes)>,
    /// In the charset `encoding` names, UTF-8 when it is absent
    message: Bytes,
}

impl Commit {
    pub fn new(
        tree: ObjectId,
        parents: Vec<ObjectId>,
        author: Signature,
        committer: Signature,
        message: impl Into<Bytes>,
    ) -> Self {
        Commit {
            tree,
            parents,
            author,
            committer,
            encoding: None,
            extra_headers: Vec::new(),
            message: message.into(),
        }
    }

    pub fn with_encoding(mut self, encoding: Option<String>) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_extra_header(mut self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.extra_headers.push((key.into(), value.into()));
        self
    }

    pub fn tree(&self) -> &ObjectId {
        &self.tree
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn author(&self) -> &Signature {
        &self.author
    }

    pub fn committer(&self) -> &Signature {
        &self.committer
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn extra_headers(&self) -> &[(String, Bytes)] {
        &self.extra_headers
    }

    pub fn header_field(&self, key: &str) -> Option<&[u8]> {
        self.extra_headers
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_ref())
    }

    /// Message for display; bytes that are not UTF-8 are replaced
    pub fn message(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.message)
    }

    pub fn message_bytes(&self) -> &[u8] {
        &self.message
    }

    /// First line of the message
    pub fn summary(&self) -> String {
        self.message().lines().next().unwrap_or("").to_string()
    }

    pub fn timestamp(&self) -> chrono::DateTime<chrono::FixedOffset> {
        self.committer.when()
    }

    pub fn to_slim(&self, oid: ObjectId) -> SlimCommit {
        SlimCommit {
            oid,
            parents: self.parents.clone(),
            time: self.committer.seconds(),
        }
    }

    fn render(&self) -> Vec<u8> {
        let mut out = format!("tree {}\n", self.tree).into_bytes();

        for parent in &self.parents {
            out.extend_from_slice(format!("parent {parent}\n").as_bytes());
        }
        out.extend_from_slice(b"author ");
        self.author.write_to(&mut out);
        out.extend_from_slice(b"\ncommitter ");
        self.committer.write_to(&mut out);
        out.push(b'\n');
        if let Some(encoding) = &self.encoding {
            out.extend_from_slice(format!("encoding {encoding}\n").as_bytes());
        }
        for (key, value) in &self.extra_headers {
            write_header(&mut out, key, value);
        }

        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }
}

/// Append `key value`, indenting continuation lines by one space
pub(crate) fn write_header(out: &mut Vec<u8>, key: &str, value: &[u8]) {
    out.extend_from_slice(key.as_bytes());
    out.push(b' ');
    for (position, line) in value.split(|&byte| byte == b'\n').enumerate() {
        if position > 0 {
            out.extend_from_slice(b"\n ");
        }
        out.extend_from_slice(line);
    }
    out.push(b'\n');
}

/// Split a header block into `(key, value)` pairs, folding continuation lines
///
/// Keys are ASCII; values stay raw bytes.
pub(crate) fn parse_headers(kind: &'static str, block: &[u8]) -> Result<Vec<(String, Bytes)>> {
    let mut headers: Vec<(String, Vec<u8>)> = Vec::new();

    for line in block.split(|&byte| byte == b'\n') {
        if let Some(continuation) = line.strip_prefix(b" ") {
            let (_, value) = headers
                .last_mut()
                .ok_or_else(|| Error::malformed(kind, "continuation line without a header"))?;
            value.push(b'\n');
            value.extend_from_slice(continuation);
            continue;
        }

        let bad_line = || Error::malformed(kind, format!("bad header line {:?}", String::from_utf8_lossy(line)));
        let space = line.iter().position(|&byte| byte == b' ').ok_or_else(bad_line)?;
        let key = std::str::from_utf8(&line[..space]).map_err(|_| bad_line())?;
        headers.push((key.to_string(), line[space + 1..].to_vec()));
    }

    Ok(headers
        .into_iter()
        .map(|(key, value)| (key, Bytes::from(value)))
        .collect())
}

/// A header value that must be text, such as an object id or a type name
pub(crate) fn header_text<'a>(kind: &'static str, key: &str, value: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(value).map_err(|_| Error::malformed(kind, format!("{key} header is not text")))
}

/// Split an object body at the first blank line
pub(crate) fn split_message(body: &[u8]) -> (&[u8], &[u8]) {
    match body.windows(2).position(|pair| pair == b"\n\n") {
        Some(blank) => (&body[..blank], &body[blank + 2..]),
        None => {
            let end = body.iter().rposition(|&byte| byte != b'\n').map_or(0, |last| last + 1);
            (&body[..end], &[])
        }
    }
}

impl Packable for Commit {
    fn serialize(&self) -> Result<Bytes> {
        Ok(Bytes::from(self.render()))
    }
}

impl Unpackable for Commit {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;

        let (header_block, message) = split_message(&content);
        let mut headers = parse_headers("commit", header_block)?.into_iter().peekable();
        let object_id = |key: &str, value: &[u8]| {
            header_text("commit", key, value).and_then(|text| {
                ObjectId::try_parse(text).map_err(|_| Error::malformed("commit", format!("bad {key} id {text}")))
            })
        };

        let tree = match headers.next() {
            Some((key, value)) if key == "tree" => object_id("tree", &value)?,
            _ => return Err(Error::malformed("commit", "missing tree line")),
        };

        let mut parents = Vec::new();
        while let Some((_, value)) = headers.next_if(|(key, _)| key == "parent") {
            parents.push(object_id("parent", &value)?);
        }

        let author = match headers.next() {
            Some((key, value)) if key == "author" => Signature::parse_bytes(&value)?,
            _ => return Err(Error::malformed("commit", "missing author line")),
        };
        let committer = match headers.next() {
            Some((key, value)) if key == "committer" => Signature::parse_bytes(&value)?,
            _ => return Err(Error::malformed("commit", "missing committer line")),
        };
        let encoding = match headers.next_if(|(key, _)| key == "encoding") {
            Some((key, value)) => Some(header_text("commit", &key, &value)?.to_string()),
            None => None,
        };

        Ok(Commit {
            tree,
            parents,
            author,
            committer,
            encoding,
            extra_headers: headers.collect(),
            message: Bytes::copy_from_slice(message),
        })
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn display(&self) -> String {
        String::from_utf8_lossy(&self.render()).into_owned()
    }
}
