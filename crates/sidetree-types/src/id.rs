use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

pub(crate) fn is_base64url(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Identifier-space prefix, typically a DID method such as `did:sidetree`.
///
/// Each namespace has its own batch cutter and writer, and its own document
/// cache. Namespaces are non-empty and contain no whitespace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.is_empty()
            || value.chars().any(char::is_whitespace)
            || value.ends_with(':')
        {
            return Err(TypeError::InvalidNamespace(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The short-form DID `<namespace>:<suffix>`.
    pub fn did(&self, suffix: &UniqueSuffix) -> String {
        format!("{}:{}", self.0, suffix)
    }
}

impl TryFrom<String> for Namespace {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.0
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({})", self.0)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ledger channel carrying anchors for one or more namespaces.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network endpoint of a peer, e.g. `peer0.org1.example.com:7051`.
///
/// Endpoints order lexicographically; lease owner selection relies on it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable document identifier: the base64url multihash of a create
/// operation's suffix data.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UniqueSuffix(String);

impl UniqueSuffix {
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if !is_base64url(&value) {
            return Err(TypeError::InvalidSuffix(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UniqueSuffix {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UniqueSuffix> for String {
    fn from(s: UniqueSuffix) -> Self {
        s.0
    }
}

impl fmt::Debug for UniqueSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UniqueSuffix({})", self.0)
    }
}

impl fmt::Display for UniqueSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolvable identifier within a namespace.
///
/// Accepts the bare suffix, the short form `<namespace>:<suffix>`, and the
/// long form `<namespace>:<suffix>:<encoded initial state>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Did {
    pub namespace: Namespace,
    pub suffix: UniqueSuffix,
    /// Base64url-encoded initial state carried by a long-form DID.
    pub initial_state: Option<String>,
}

impl Did {
    pub fn parse(namespace: &Namespace, input: &str) -> Result<Self, TypeError> {
        let invalid = || TypeError::InvalidDid {
            input: input.to_string(),
            namespace: namespace.to_string(),
        };

        let rest = match input.strip_prefix(namespace.as_str()) {
            Some(rest) => rest.strip_prefix(':').ok_or_else(invalid)?,
            None => input,
        };

        let (suffix, initial_state) = match rest.split_once(':') {
            Some((suffix, state)) => {
                if !is_base64url(state) {
                    return Err(invalid());
                }
                (suffix, Some(state.to_string()))
            }
            None => (rest, None),
        };

        let suffix = UniqueSuffix::new(suffix).map_err(|_| invalid())?;
        Ok(Self {
            namespace: namespace.clone(),
            suffix,
            initial_state,
        })
    }

    pub fn is_long_form(&self) -> bool {
        self.initial_state.is_some()
    }

    /// The short-form identifier, dropping any initial state.
    pub fn short_form(&self) -> String {
        self.namespace.did(&self.suffix)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.initial_state {
            Some(state) => write!(f, "{}:{}", self.short_form(), state),
            None => f.write_str(&self.short_form()),
        }
    }
}
