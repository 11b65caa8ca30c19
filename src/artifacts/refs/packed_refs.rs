use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use std::collections::BTreeMap;

/// First line written to `packed-refs`
pub const PACKED_REFS_HEADER: &str = "# pack-refs with: peeled sorted ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedRef {
    pub oid: ObjectId,
    pub peeled: Option<ObjectId>,
}

/// Parsed content of `packed-refs`, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedRefs {
    refs: BTreeMap<String, PackedRef>,
}

impl PackedRefs {
    pub fn parse(content: &str) -> Result<Self> {
        let mut refs = BTreeMap::new();
        let mut last: Option<String> = None;

        for line in content.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(peeled) = line.strip_prefix('^') {
                let peeled = ObjectId::try_parse(peeled.trim_end())
                    .map_err(|_| Error::malformed("packed-refs", line))?;
                let entry: &mut PackedRef = last
                    .as_ref()
                    .and_then(|name| refs.get_mut(name))
                    .ok_or_else(|| Error::malformed("packed-refs", "peel line without a reference"))?;
                entry.peeled = Some(peeled);
                continue;
            }

            let (oid, name) = line
                .split_once(' ')
                .ok_or_else(|| Error::malformed("packed-refs", line))?;
            let oid = ObjectId::try_parse(oid).map_err(|_| Error::malformed("packed-refs", line))?;

            refs.insert(name.to_string(), PackedRef { oid, peeled: None });
            last = Some(name.to_string());
        }

        Ok(PackedRefs { refs })
    }

    pub fn serialize(&self) -> String {
        let mut content = format!("{PACKED_REFS_HEADER}\n");

        for (name, packed) in &self.refs {
            content.push_str(&format!("{} {name}\n", packed.oid));
            if let Some(peeled) = packed.peeled {
                content.push_str(&format!("^{peeled}\n"));
            }
        }

        content
    }

    pub fn get(&self, name: &str) -> Option<&PackedRef> {
        self.refs.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, packed: PackedRef) {
        self.refs.insert(name.into(), packed);
    }

    pub fn remove(&mut self, name: &str) -> Option<PackedRef> {
        self.refs.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.refs.contains_key(name)
    }

    /// Whether some packed name lives below `name/`
    pub fn has_children(&self, name: &str) -> bool {
        let prefix = format!("{name}/");
        self.refs
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(candidate, _)| candidate.starts_with(&prefix))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PackedRef)> {
        self.refs.iter()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
