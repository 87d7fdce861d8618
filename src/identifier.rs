//! Identifier strings.
//!
//! A leaf is named by `"label:hash"` where `label` is a decimal string
//! assigned at DAG-build time and `hash` encodes the SHA-256 digest of the
//! leaf's canonical preimage. The root is referenced by bare hash and never
//! carries a label.

use crate::error::{Result, ScionicError};
use cid::Cid;
use multibase::Base;
use multihash::Multihash;

/// SHA2-256 multihash code.
const MH_SHA2_256: u64 = 0x12;
/// CBOR multicodec, used as the CID codec for leaf preimages.
const CODEC_CBOR: u64 = 0x71;

/// How a digest is rendered into the hash portion of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierEncoding {
    /// CID v1 with codec CBOR and multihash SHA2-256 (`bafy...`).
    CidV1,
    /// Multibase string of the raw 32-byte digest.
    Multibase(Base),
}

impl Default for IdentifierEncoding {
    fn default() -> Self {
        IdentifierEncoding::CidV1
    }
}

impl IdentifierEncoding {
    /// Render a raw SHA-256 digest as a hash string.
    pub fn encode_digest(&self, digest: &[u8]) -> Result<String> {
        match self {
            IdentifierEncoding::CidV1 => {
                let mh = Multihash::<64>::wrap(MH_SHA2_256, digest)
                    .map_err(|e| ScionicError::InvalidIdentifier(e.to_string()))?;
                Ok(Cid::new_v1(CODEC_CBOR, mh).to_string())
            }
            IdentifierEncoding::Multibase(base) => Ok(multibase::encode(*base, digest)),
        }
    }
}

/// Recover the raw digest bytes from a stored hash string, whichever
/// encoding produced it. Any label prefix must already be stripped.
pub fn decode_digest(hash: &str) -> Result<Vec<u8>> {
    if let Ok(cid) = Cid::try_from(hash) {
        return Ok(cid.hash().digest().to_vec());
    }

    match multibase::decode(hash) {
        Ok((_, bytes)) => Ok(bytes),
        Err(_) => Err(ScionicError::InvalidIdentifier(hash.to_string())),
    }
}

/// Detect which encoding produced a hash string, so rebuilt leaves keep the
/// encoding of the leaves they replace.
pub fn encoding_of(hash: &str) -> Result<IdentifierEncoding> {
    if Cid::try_from(hash).is_ok() {
        return Ok(IdentifierEncoding::CidV1);
    }

    match multibase::decode(hash) {
        Ok((base, _)) => Ok(IdentifierEncoding::Multibase(base)),
        Err(_) => Err(ScionicError::InvalidIdentifier(hash.to_string())),
    }
}

/// Split an identifier into `(label, hash)`. Identifiers without a label
/// split into an empty label and the input unchanged.
pub fn split(identifier: &str) -> (&str, &str) {
    let mut parts = identifier.splitn(3, ':');

    match (parts.next(), parts.next(), parts.next()) {
        (Some(label), Some(hash), None) => (label, hash),
        _ => ("", identifier),
    }
}

pub fn compose(label: &str, hash: &str) -> String {
    format!("{}:{}", label, hash)
}

pub fn has_label(identifier: &str) -> bool {
    !label_of(identifier).is_empty()
}

pub fn label_of(identifier: &str) -> &str {
    split(identifier).0
}

pub fn hash_of(identifier: &str) -> &str {
    split(identifier).1
}

/// Parse a label into its numeric value for ordering.
pub fn parse_label(label: &str) -> Result<u64> {
    label
        .parse::<u64>()
        .map_err(|_| ScionicError::InvalidLabel(label.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_labelled() {
        let (label, hash) = split("7:bafyexample");
        assert_eq!(label, "7");
        assert_eq!(hash, "bafyexample");
        assert!(has_label("7:bafyexample"));
    }

    #[test]
    fn test_split_unlabelled() {
        let (label, hash) = split("bafyexample");
        assert_eq!(label, "");
        assert_eq!(hash, "bafyexample");
        assert!(!has_label("bafyexample"));
    }

    #[test]
    fn test_split_rejects_extra_separators() {
        // Not exactly two parts, so treated as a bare hash.
        let (label, hash) = split("a:b:c");
        assert_eq!(label, "");
        assert_eq!(hash, "a:b:c");
    }

    #[test]
    fn test_compose_round_trip() {
        let id = compose("3", "bafyexample");
        assert_eq!(id, "3:bafyexample");
        assert_eq!(label_of(&id), "3");
        assert_eq!(hash_of(&id), "bafyexample");
    }

    #[test]
    fn test_encode_decode_cid() -> Result<()> {
        let digest = [0xabu8; 32];
        let hash = IdentifierEncoding::CidV1.encode_digest(&digest)?;
        assert!(hash.starts_with("bafy"));
        assert_eq!(decode_digest(&hash)?, digest.to_vec());
        Ok(())
    }

    #[test]
    fn test_encode_decode_multibase() -> Result<()> {
        let digest = [0x5cu8; 32];
        let hash = IdentifierEncoding::Multibase(Base::Base64).encode_digest(&digest)?;
        assert_eq!(decode_digest(&hash)?, digest.to_vec());
        Ok(())
    }

    #[test]
    fn test_parse_label_ordering() -> Result<()> {
        // Numeric, not lexicographic: "10" sorts after "2".
        assert!(parse_label("10")? > parse_label("2")?);
        assert!(parse_label("x").is_err());
        Ok(())
    }
}
