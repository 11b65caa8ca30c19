use crate::errors::{Error, Result};
use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Commit,
    Tree,
    Blob,
    Tag,
}

/// Parsed `"<type> <size>\0"` prefix of an encoded object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    pub object_type: ObjectType,
    pub size: usize,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Commit => "commit",
            ObjectType::Tree => "tree",
            ObjectType::Blob => "blob",
            ObjectType::Tag => "tag",
        }
    }

    /// Type code used in pack entry headers
    pub fn from_pack_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ObjectType::Commit),
            2 => Some(ObjectType::Tree),
            3 => Some(ObjectType::Blob),
            4 => Some(ObjectType::Tag),
            _ => None,
        }
    }

    /// Read the `"<type> <size>\0"` header, leaving the reader at the body
    pub fn parse_object_header(data_reader: &mut impl BufRead) -> Result<ObjectHeader> {
        let mut object_type = Vec::new();
        data_reader.read_until(b' ', &mut object_type)?;
        if object_type.pop() != Some(b' ') {
            return Err(Error::malformed("object header", "missing type separator"));
        }

        let object_type = std::str::from_utf8(&object_type)
            .map_err(|_| Error::malformed("object header", "type is not utf-8"))?;
        let object_type = ObjectType::try_from(object_type)?;

        let mut size = Vec::new();
        data_reader.read_until(b'\0', &mut size)?;
        if size.pop() != Some(b'\0') {
            return Err(Error::malformed("object header", "missing NUL terminator"));
        }

        let size = std::str::from_utf8(&size)
            .ok()
            .and_then(|size| size.parse::<usize>().ok())
            .ok_or_else(|| Error::malformed("object header", "size is not a number"))?;

        Ok(ObjectHeader { object_type, size })
    }

    pub fn header(&self, size: usize) -> String {
        format!("{} {}\0", self.as_str(), size)
    }
}

impl TryFrom<&str> for ObjectType {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "commit" => Ok(ObjectType::Commit),
            "tree" => Ok(ObjectType::Tree),
            "blob" => Ok(ObjectType::Blob),
            "tag" => Ok(ObjectType::Tag),
            _ => Err(Error::malformed("object type", value)),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Read};

    #[test]
    fn header_is_consumed_up_to_the_body() {
        let mut reader = Cursor::new(b"blob 5\0hello".to_vec());
        let header = ObjectType::parse_object_header(&mut reader).unwrap();

        assert_eq!(
            header,
            ObjectHeader {
                object_type: ObjectType::Blob,
                size: 5
            }
        );

        let mut body = String::new();
        reader.read_to_string(&mut body).unwrap();
        assert_eq!(body, "hello");
    }

    #[test]
    fn unknown_types_are_malformed() {
        let mut reader = Cursor::new(b"blog 5\0hello".to_vec());
        let error = ObjectType::parse_object_header(&mut reader).unwrap_err();

        assert_eq!(error.code(), crate::errors::ErrorCode::MalformedObject);
    }

    #[test]
    fn truncated_headers_are_malformed() {
        let mut reader = Cursor::new(b"tree 12".to_vec());
        assert!(ObjectType::parse_object_header(&mut reader).is_err());
    }
}
