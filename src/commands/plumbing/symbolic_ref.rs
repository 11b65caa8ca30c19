use crate::areas::repository::Repository;
use std::io::Write;

impl Repository {
    /// Print the target of `name`, or point it at `target`
    pub fn symbolic_ref(
        &self,
        writer: &mut impl Write,
        name: &str,
        target: Option<&str>,
        message: &str,
    ) -> anyhow::Result<()> {
        let Some(target) = target else {
            let reference = self.refs().lookup(name)?;
            let target = reference
                .symbolic_target()
                .ok_or_else(|| anyhow::anyhow!("ref {name} is not a symbolic ref"))?;
            writeln!(writer, "{target}")?;
            return Ok(());
        };

        if self.refs().exists(name) {
            self.refs().set_symbolic_target(name, target, message)?;
        } else {
            self.refs().create_symbolic(name, target, false, message)?;
        }

        Ok(())
    }
}
