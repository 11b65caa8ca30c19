use crate::areas::database::Database;
use crate::areas::repository::Repository;
use crate::artifacts::objects::object_type::ObjectType;
use std::io::Write;
use std::path::Path;

impl Repository {
    /// Print the id of `path` as an object of `object_type`, storing it when `write` is set
    pub fn hash_object(
        &self,
        writer: &mut impl Write,
        path: &Path,
        object_type: ObjectType,
        write: bool,
    ) -> anyhow::Result<()> {
        let oid = match (write, object_type) {
            (false, _) => Database::hash_file(path, object_type)?,
            (true, ObjectType::Blob) => self.create_blob_from_file(path)?,
            (true, _) => {
                let content = std::fs::read(path)?;
                self.database().write(object_type, &content)?
            }
        };

        writeln!(writer, "{oid}")?;

        Ok(())
    }
}
