use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy, Eq, Hash, Ord, Default, PartialEq, PartialOrd)]
pub enum FileMode {
    #[default]
    Regular,
    Executable,
}

/// Mode of a tree or index entry
#[derive(Debug, Clone, Copy, Eq, Hash, Ord, Default, PartialEq, PartialOrd)]
pub enum EntryMode {
    File(FileMode),
    Symlink,
    /// Commit link to a nested repository
    Submodule,
    #[default]
    Directory,
}

impl EntryMode {
    pub const REGULAR: EntryMode = EntryMode::File(FileMode::Regular);
    pub const EXECUTABLE: EntryMode = EntryMode::File(FileMode::Executable);

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryMode::File(FileMode::Regular) => "100644",
            EntryMode::File(FileMode::Executable) => "100755",
            EntryMode::Symlink => "120000",
            EntryMode::Submodule => "160000",
            EntryMode::Directory => "40000",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            EntryMode::File(FileMode::Regular) => 0o100644,
            EntryMode::File(FileMode::Executable) => 0o100755,
            EntryMode::Symlink => 0o120000,
            EntryMode::Submodule => 0o160000,
            EntryMode::Directory => 0o40000,
        }
    }

    /// Parse the octal mode written in tree entries
    pub fn from_octal_str(mode: &str) -> Result<Self> {
        let value = u32::from_str_radix(mode, 8).map_err(|_| Error::malformed("mode", mode))?;
        Self::try_from(value)
    }

    /// Type of the object an entry with this mode points at
    pub fn object_type(&self) -> ObjectType {
        match self {
            EntryMode::Directory => ObjectType::Tree,
            EntryMode::Submodule => ObjectType::Commit,
            EntryMode::File(_) | EntryMode::Symlink => ObjectType::Blob,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }
}

impl TryFrom<u32> for EntryMode {
    type Error = Error;

    fn try_from(mode: u32) -> Result<Self> {
        match mode {
            0o100644 => Ok(EntryMode::File(FileMode::Regular)),
            0o100755 => Ok(EntryMode::File(FileMode::Executable)),
            0o120000 => Ok(EntryMode::Symlink),
            0o160000 => Ok(EntryMode::Submodule),
            0o40000 => Ok(EntryMode::Directory),
            _ => Err(Error::malformed("mode", format!("{mode:o}"))),
        }
    }
}

impl From<FileMode> for EntryMode {
    fn from(mode: FileMode) -> Self {
        EntryMode::File(mode)
    }
}

impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("100644", EntryMode::REGULAR, ObjectType::Blob)]
    #[case("100755", EntryMode::EXECUTABLE, ObjectType::Blob)]
    #[case("120000", EntryMode::Symlink, ObjectType::Blob)]
    #[case("160000", EntryMode::Submodule, ObjectType::Commit)]
    #[case("40000", EntryMode::Directory, ObjectType::Tree)]
    fn modes_map_to_object_types(
        #[case] octal: &str,
        #[case] mode: EntryMode,
        #[case] object_type: ObjectType,
    ) {
        assert_eq!(EntryMode::from_octal_str(octal).unwrap(), mode);
        assert_eq!(mode.as_str(), octal);
        assert_eq!(mode.object_type(), object_type);
    }

    #[rstest]
    #[case("100600")]
    #[case("777")]
    #[case("10x644")]
    fn unknown_modes_are_malformed(#[case] octal: &str) {
        assert!(EntryMode::from_octal_str(octal).is_err());
    }
}
