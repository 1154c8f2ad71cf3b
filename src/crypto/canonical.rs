//! Canonical string encoding
//!
//! Headers and transactions are hashed over the string forms of their
//! fields. Each field is terminated by `|` and free-form text is
//! length-prefixed, so two different field lists never share an encoding.

use super::{double_hash, Hash};

/// Accumulates the canonical encoding of a record
#[derive(Debug, Default, Clone)]
pub struct Canonical {
    buf: String,
}

impl Canonical {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decimal integer field
    pub fn num(mut self, value: impl std::fmt::Display) -> Self {
        self.buf.push_str(&value.to_string());
        self.buf.push('|');
        self
    }

    /// Append a hash field as lowercase hex
    pub fn hash(mut self, value: &Hash) -> Self {
        self.buf.push_str(&value.to_hex());
        self.buf.push('|');
        self
    }

    /// Append a hex-encoded byte field
    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.buf.push_str(&hex::encode(value));
        self.buf.push('|');
        self
    }

    /// Append a sequence of integers joined by `,`
    pub fn list(mut self, values: &[u64]) -> Self {
        let joined: Vec<String> = values.iter().map(u64::to_string).collect();
        self.buf.push_str(&joined.join(","));
        self.buf.push('|');
        self
    }

    /// Append free-form text as `<byte length>:<text>`
    pub fn text(mut self, value: &str) -> Self {
        self.buf.push_str(&value.len().to_string());
        self.buf.push(':');
        self.buf.push_str(value);
        self.buf.push('|');
        self
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Double hash of the accumulated encoding
    pub fn digest(&self) -> Hash {
        double_hash(self.buf.as_bytes())
    }
}
