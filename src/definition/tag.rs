use derive_more::Display;
use std::borrow::Cow;

/// An immutable key-value pair attached to a definition. Tags are used as
/// descriptive metadata and as selectors when filtering definitions. Two
/// tags are equal when both their keys and values are equal.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display)]
#[display(fmt = "{}={}", key, value)]
pub struct Tag {
    key: Cow<'static, str>,
    value: Cow<'static, str>,
}

/// The tag that makes a definition eligible for automatic wiring. Only
/// definitions carrying this tag are considered when resolving the
/// dependencies of another definition.
pub const TAG_AUTOWIRED: Tag = Tag::from_static("autowired", "true");

impl Tag {
    /// Creates a new tag.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Tag {
            key: Cow::Owned(key.into()),
            value: Cow::Owned(value.into()),
        }
    }

    /// Creates a new tag from static strings. This can be used in constants.
    #[must_use]
    pub const fn from_static(key: &'static str, value: &'static str) -> Self {
        Tag {
            key: Cow::Borrowed(key),
            value: Cow::Borrowed(value),
        }
    }

    /// The key of this tag.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The value of this tag.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}
