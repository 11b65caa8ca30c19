use crate::areas::repository::Repository;
use crate::artifacts::objects::object_id::ObjectId;

impl Repository {
    /// Point `name` (through symbolic references) at `new`
    ///
    /// With `old`, the update only happens when the reference currently holds that
    /// value; an all-zero `old` requires the reference not to exist.
    pub fn update_ref(&self, name: &str, new: &str, old: Option<&str>, message: &str) -> anyhow::Result<()> {
        let new = self.revparse_single(new)?;
        self.check_current_value(name, old)?;

        self.refs().update_through(name, new, message)?;

        Ok(())
    }

    pub fn delete_ref(&self, name: &str, old: Option<&str>) -> anyhow::Result<()> {
        self.check_current_value(name, old)?;
        self.refs().delete(name)?;

        Ok(())
    }

    fn check_current_value(&self, name: &str, expected: Option<&str>) -> anyhow::Result<()> {
        let Some(expected) = expected else {
            return Ok(());
        };

        let expected = ObjectId::try_parse(expected)?;
        let current = match self.refs().name_to_oid(name) {
            Ok(oid) => oid,
            Err(error) if error.is_not_found() => ObjectId::ZERO,
            Err(error) => return Err(error.into()),
        };

        if current != expected {
            anyhow::bail!("cannot lock ref '{name}': is at {current} but expected {expected}");
        }

        Ok(())
    }
}
