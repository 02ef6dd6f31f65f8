//! Signed transactions and their wire form.
//!
//! Child blocks carry signed transactions: the raw transaction together with one 65-byte
//! `(r || s || v)` signature per input. The signed encoding prepends the signature list to
//! the raw slots, so a signed byte string commits to both.

use plasma_watcher_primitives::constants::SIGNATURE_SIZE;
use rlp::{Rlp, RlpStream};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    errors::TxError,
    transaction::{check_consumed, decode_slots, encode_slots, Transaction},
};

/// A 65-byte `(r || s || v)` signature over the typed-data hash of a transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; SIGNATURE_SIZE]);

impl Signature {
    /// Creates a signature from a byte slice, rejecting wrong lengths.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TxError> {
        let array: [u8; SIGNATURE_SIZE] =
            bytes.try_into().map_err(|_| TxError::InvalidSignature)?;
        Ok(Signature(array))
    }

    /// Returns the signature as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The recovery byte `v`.
    pub const fn v(&self) -> u8 {
        self.0[SIGNATURE_SIZE - 1]
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature(0x{})", hex_prefix(&self.0))
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes[..8].iter().map(|b| format!("{b:02x}")).collect()
}

// [u8; 65] is above serde's derived-array limit, so the impls are spelled out.
impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SignatureVisitor;

        impl<'de> de::Visitor<'de> for SignatureVisitor {
            type Value = Signature;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{SIGNATURE_SIZE} signature bytes")
            }

            fn visit_bytes<E: de::Error>(self, bytes: &[u8]) -> Result<Signature, E> {
                Signature::from_slice(bytes)
                    .map_err(|_| E::invalid_length(bytes.len(), &self))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Signature, A::Error> {
                let mut bytes = [0u8; SIGNATURE_SIZE];
                for (index, byte) in bytes.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(index, &self))?;
                }
                Ok(Signature(bytes))
            }
        }

        deserializer.deserialize_bytes(SignatureVisitor)
    }
}

/// A raw transaction bundled with its per-input signatures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signed {
    /// The raw transaction.
    pub raw: Transaction,

    /// One signature per populated input, in input order.
    pub sigs: Vec<Signature>,
}

impl Signed {
    /// Bundles a raw transaction with its signatures.
    pub fn new(raw: Transaction, sigs: Vec<Signature>) -> Self {
        Signed { raw, sigs }
    }

    /// The wire encoding carried in child blocks: `[sigs, inputs, outputs, metadata]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(4);
        stream.begin_list(self.sigs.len());
        for sig in &self.sigs {
            stream.append(&sig.as_bytes());
        }
        encode_slots(&mut stream, &self.raw);
        stream.out().to_vec()
    }

    /// Inverse of [`Signed::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, TxError> {
        let rlp = Rlp::new(bytes);
        check_consumed(&rlp, bytes)?;
        if rlp.item_count()? != 4 {
            return Err(rlp::DecoderError::RlpIncorrectListLen.into());
        }

        let sigs_rlp = rlp.at(0)?;
        let mut sigs = Vec::with_capacity(sigs_rlp.item_count()?);
        for index in 0..sigs_rlp.item_count()? {
            sigs.push(Signature::from_slice(sigs_rlp.at(index)?.data()?)?);
        }

        let raw = decode_slots(&rlp.at(1)?, &rlp.at(2)?, &rlp.at(3)?)?;
        Ok(Signed { raw, sigs })
    }
}
