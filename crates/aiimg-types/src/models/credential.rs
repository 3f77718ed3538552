//! API credential pool.

use std::fmt;

/// An opaque API key and its fixed position in the pool.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    index: usize,
    key: String,
}

impl Credential {
    pub fn new(index: usize, key: impl Into<String>) -> Self {
        Self { index, key: key.into() }
    }

    /// Zero-based position in the pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// 1-based position, used in logs instead of the key.
    pub fn ordinal(&self) -> usize {
        self.index + 1
    }

    pub fn secret(&self) -> &str {
        &self.key
    }

    /// First and last four characters, for operator-facing output.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.key.chars().collect();
        if chars.len() <= 8 {
            return "****".to_string();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("index", &self.index)
            .field("key", &self.masked())
            .finish()
    }
}

/// Ordered, immutable list of credentials. Order defines rotation sequence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
}

impl CredentialPool {
    /// Build a pool from raw keys. Blank keys are dropped; order is kept.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let credentials = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .enumerate()
            .map(|(index, key)| Credential::new(index, key))
            .collect();
        Self { credentials }
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Credential> {
        self.credentials.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter()
    }
}
