use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KeyError, KeyResult};
use crate::token::{VersionToken, TOKEN_LEN};

/// Marker used in place of a parent token on a document's root version.
pub const ROOT_LABEL: &str = "root";

/// The store's primary key: `(token, parent, document id)` rendered as
/// `"{token}-{parent}-{doc}"`.
///
/// The token comes first and is fixed width, so a reverse lexicographic
/// scan over all keys visits records most-recent-first regardless of which
/// document they belong to. The document id is the unstructured tail: it
/// may itself contain `-` without confusing the decoder, because both
/// leading fields have fixed shapes.
///
/// Keys are immutable once written. The same key never maps to two
/// different values over the life of a store (deletes remove the record,
/// they do not free the key for reuse).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionKey {
    token: VersionToken,
    parent: Option<VersionToken>,
    doc: String,
}

impl VersionKey {
    /// Build a key, validating the document id.
    pub fn new(
        doc: impl Into<String>,
        token: VersionToken,
        parent: Option<VersionToken>,
    ) -> KeyResult<Self> {
        let doc = doc.into();
        if doc.is_empty() {
            return Err(KeyError::InvalidDocumentId(
                "document id must not be empty".into(),
            ));
        }
        Ok(Self { token, parent, doc })
    }

    /// A root key (no parent) for a new document.
    pub fn root(doc: impl Into<String>, token: VersionToken) -> KeyResult<Self> {
        Self::new(doc, token, None)
    }

    /// A child key pointing at `parent`.
    pub fn child(
        doc: impl Into<String>,
        token: VersionToken,
        parent: VersionToken,
    ) -> KeyResult<Self> {
        Self::new(doc, token, Some(parent))
    }

    /// Decode a key from its string form.
    pub fn parse(s: &str) -> KeyResult<Self> {
        let (token, parent, consumed) = parse_version_fields(s)?;
        let doc = &s[consumed..];
        if doc.is_empty() {
            return Err(KeyError::Malformed(format!(
                "key {s:?} has no document id"
            )));
        }
        Ok(Self {
            token,
            parent,
            doc: doc.to_owned(),
        })
    }

    /// Reassemble a key from a version label (`"{token}-{parent}"`, the
    /// form the HTTP gateway uses as a path segment) and a document id.
    pub fn from_label(doc: &str, label: &str) -> KeyResult<Self> {
        Self::parse(&format!("{label}-{doc}"))
    }

    /// The document id component.
    pub fn document_id(&self) -> &str {
        &self.doc
    }

    /// This version's token.
    pub fn token(&self) -> VersionToken {
        self.token
    }

    /// The parent version's token, or `None` on a root version.
    pub fn parent(&self) -> Option<VersionToken> {
        self.parent
    }

    /// Whether this is a document's root version.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// The `"{token}-{parent}"` form, without the document id.
    pub fn version_label(&self) -> String {
        match self.parent {
            Some(parent) => format!("{}-{}", self.token, parent),
            None => format!("{}-{ROOT_LABEL}", self.token),
        }
    }

    /// The full string encoding.
    pub fn encode(&self) -> String {
        format!("{}-{}", self.version_label(), self.doc)
    }
}

/// O(1) projection of the document id out of an encoded key.
///
/// Used by scans that only need to group or filter by document, where
/// decoding the whole key would allocate for nothing.
pub fn document_id_of(encoded: &str) -> KeyResult<&str> {
    let (_, _, consumed) = parse_version_fields(encoded)?;
    let doc = &encoded[consumed..];
    if doc.is_empty() {
        return Err(KeyError::Malformed(format!(
            "key {encoded:?} has no document id"
        )));
    }
    Ok(doc)
}

/// Parse the leading `token-parent-` fields. Returns the tokens and the
/// byte offset where the document id begins.
fn parse_version_fields(s: &str) -> KeyResult<(VersionToken, Option<VersionToken>, usize)> {
    let head = s
        .get(..TOKEN_LEN)
        .ok_or_else(|| KeyError::Malformed(format!("key {s:?} too short")))?;
    let token = VersionToken::parse(head)?;
    if s.as_bytes().get(TOKEN_LEN) != Some(&b'-') {
        return Err(KeyError::Malformed(format!(
            "key {s:?} missing separator after token"
        )));
    }

    // The parent field is either "root" or 16 hex digits; these can never
    // collide ('r' is not a hex digit).
    let rest = &s[TOKEN_LEN + 1..];
    if rest.starts_with("root-") {
        return Ok((token, None, TOKEN_LEN + 1 + ROOT_LABEL.len() + 1));
    }

    let parent_str = rest
        .get(..TOKEN_LEN)
        .ok_or_else(|| KeyError::Malformed(format!("key {s:?} has truncated parent")))?;
    let parent = VersionToken::parse(parent_str)?;
    if rest.as_bytes().get(TOKEN_LEN) != Some(&b'-') {
        return Err(KeyError::Malformed(format!(
            "key {s:?} missing separator after parent"
        )));
    }
    Ok((token, Some(parent), TOKEN_LEN + 1 + TOKEN_LEN + 1))
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl fmt::Debug for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionKey({})", self.encode())
    }
}

impl FromStr for VersionKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionKey {
    type Error = KeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<VersionKey> for String {
    fn from(k: VersionKey) -> String {
        k.encode()
    }
}
