use crate::artifacts::refs::{HEADS_PREFIX, INVALID_REF_NAME_REGEX, REFS_PREFIX, TAGS_PREFIX};
use crate::errors::{Error, Result};
use std::sync::LazyLock;

static INVALID_REF_NAME: LazyLock<std::result::Result<regex::Regex, regex::Error>> =
    LazyLock::new(|| regex::Regex::new(INVALID_REF_NAME_REGEX));

pub(crate) fn matches_invalid_pattern(name: &str) -> Result<bool> {
    let re = INVALID_REF_NAME
        .as_ref()
        .map_err(|error| Error::invalid("reference name pattern", error.to_string()))?;

    Ok(re.is_match(name))
}

/// Check a full reference name such as `HEAD` or `refs/heads/main`
///
/// One-level names must be upper case (`HEAD`, `ORIG_HEAD`); everything else
/// lives under `refs/`.
pub fn validate_ref_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "@" || matches_invalid_pattern(name)? {
        return Err(Error::invalid("reference name", name));
    }

    let one_level = !name.contains('/');
    if one_level && !name.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
        return Err(Error::invalid("reference name", name));
    }
    if !one_level && (!name.starts_with(REFS_PREFIX) || name.len() == REFS_PREFIX.len()) {
        return Err(Error::invalid("reference name", name));
    }

    Ok(())
}

/// Short branch name, without the `refs/heads/` prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchName(String);

impl BranchName {
    pub fn try_parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name == "HEAD" || name.starts_with('-') || matches_invalid_pattern(&name)? {
            return Err(Error::invalid("branch name", name));
        }

        Ok(Self(name))
    }

    /// Accept `refs/heads/<name>` and return the short name
    pub fn try_parse_ref_name(ref_name: &str) -> Result<Self> {
        let name = ref_name
            .strip_prefix(HEADS_PREFIX)
            .ok_or_else(|| Error::invalid("branch reference", ref_name))?;

        Self::try_parse(name)
    }

    pub fn to_ref_name(&self) -> String {
        format!("{HEADS_PREFIX}{}", self.0)
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short tag name, without the `refs/tags/` prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagName(String);

impl TagName {
    pub fn try_parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.starts_with('-') || matches_invalid_pattern(&name)? {
            return Err(Error::invalid("tag name", name));
        }

        Ok(Self(name))
    }

    pub fn to_ref_name(&self) -> String {
        format!("{TAGS_PREFIX}{}", self.0)
    }
}

impl AsRef<str> for TagName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TagName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::proptest;
    use rstest::rstest;

    #[rstest]
    #[case("HEAD")]
    #[case("ORIG_HEAD")]
    #[case("refs/heads/main")]
    #[case("refs/heads/feature/x-1")]
    #[case("refs/tags/v1.0")]
    #[case("refs/remotes/origin/main")]
    fn valid_reference_names(#[case] name: &str) {
        assert!(validate_ref_name(name).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("head")]
    #[case("heads/main")]
    #[case("refs/")]
    #[case("refs/heads/a..b")]
    #[case("refs/heads/.hidden")]
    #[case("refs/heads/x.lock")]
    #[case("refs/heads/x.lock/y")]
    #[case("refs/heads//double")]
    #[case("refs/heads/trailing/")]
    #[case("refs/heads/dot.")]
    #[case("refs/heads/at@{1}")]
    #[case("refs/heads/sp ace")]
    #[case("refs/heads/star*")]
    fn invalid_reference_names(#[case] name: &str) {
        assert!(validate_ref_name(name).is_err());
    }

    proptest! {
        #[test]
        fn hierarchical_branch_names_are_valid(
            prefix in "[a-zA-Z0-9_][a-zA-Z0-9_-]*",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            let branch = BranchName::try_parse(format!("{prefix}/{suffix}")).unwrap();
            assert!(validate_ref_name(&branch.to_ref_name()).is_ok());
        }

        #[test]
        fn branch_names_with_special_chars_are_invalid(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+",
            special_char in r"[\*:\?\[\\^~ ]"
        ) {
            assert!(BranchName::try_parse(format!("{prefix}{special_char}{suffix}")).is_err());
        }
    }

    #[test]
    fn branch_refs_strip_their_prefix() {
        let branch = BranchName::try_parse_ref_name("refs/heads/topic").unwrap();

        assert_eq!(branch.as_ref(), "topic");
        assert!(BranchName::try_parse_ref_name("refs/tags/topic").is_err());
        assert!(BranchName::try_parse("-topic").is_err());
    }
}
