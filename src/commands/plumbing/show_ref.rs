use crate::areas::repository::Repository;
use crate::artifacts::core::WalkControl;
use crate::artifacts::refs::list_filter::RefListFilter;
use crate::artifacts::refs::reference::Reference;
use std::io::Write;

#[derive(Debug, Clone, Copy, Default)]
pub struct ShowRefOptions {
    pub heads: bool,
    pub tags: bool,
    /// Also print the peeled target of annotated tags as `<name>^{}`
    pub dereference: bool,
}

impl Repository {
    pub fn show_ref(&self, writer: &mut impl Write, opts: ShowRefOptions) -> anyhow::Result<()> {
        let wanted = |reference: &Reference| {
            let any = !opts.heads && !opts.tags;
            any || (opts.heads && reference.is_branch()) || (opts.tags && reference.is_tag())
        };

        let mut lines = Vec::new();
        self.refs().for_each(RefListFilter::ALL, |reference| {
            if let Some(oid) = reference.target()
                && wanted(reference)
            {
                lines.push((reference.name().to_string(), oid, reference.peeled()));
            }
            WalkControl::Continue
        })?;

        if lines.is_empty() {
            anyhow::bail!("no matching references");
        }

        for (name, oid, peeled) in lines {
            writeln!(writer, "{oid} {name}")?;
            if !opts.dereference {
                continue;
            }

            let peeled = match peeled {
                Some(peeled) => Some(peeled),
                None => {
                    let (target, _) = self.database().peel_tags(&oid)?;
                    (target != oid).then_some(target)
                }
            };
            if let Some(peeled) = peeled {
                writeln!(writer, "{peeled} {name}^{{}}")?;
            }
        }

        Ok(())
    }
}
