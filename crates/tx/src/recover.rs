//! Spender recovery from per-input signatures.

use std::sync::LazyLock;

use ethereum_types::{Address, H256};
use keccak_hash::keccak;
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    All, Message, Secp256k1,
};

use crate::{errors::TxError, signed::Signature, typed_data::typed_data_hash, Signed};

static SECP: LazyLock<Secp256k1<All>> = LazyLock::new(Secp256k1::new);

/// Recovers the address that produced `sig` over `digest`.
///
/// Accepts the Ethereum recovery byte convention `v ∈ {27, 28}`.
pub fn recover_address(digest: H256, sig: &Signature) -> Result<Address, TxError> {
    let recovery_id = match sig.v() {
        27 | 28 => RecoveryId::from_i32((sig.v() - 27) as i32)
            .map_err(|_| TxError::InvalidSignature)?,
        _ => return Err(TxError::InvalidSignature),
    };
    let signature = RecoverableSignature::from_compact(&sig.as_bytes()[..64], recovery_id)
        .map_err(|_| TxError::InvalidSignature)?;

    let message = Message::from_digest(digest.to_fixed_bytes());
    let public_key = SECP
        .recover_ecdsa(&message, &signature)
        .map_err(|_| TxError::InvalidSignature)?;

    let serialized = public_key.serialize_uncompressed();
    let hash = keccak(&serialized[1..]);
    Ok(Address::from_slice(&hash.as_bytes()[12..]))
}

/// Recovers, for each input of `signed`, the address that produced the matching signature
/// over the transaction's typed-data hash.
pub fn recover_spenders(signed: &Signed) -> Result<Vec<Address>, TxError> {
    if signed.sigs.len() != signed.raw.inputs.len() {
        return Err(TxError::ArityMismatch {
            inputs: signed.raw.inputs.len(),
            sigs: signed.sigs.len(),
        });
    }

    let digest = typed_data_hash(&signed.raw);
    signed
        .sigs
        .iter()
        .map(|sig| recover_address(digest, sig))
        .collect()
}

/// Signing support for fixtures. The watcher itself never signs anything.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_signing {
    use secp256k1::SecretKey;

    use super::*;
    use crate::transaction::Transaction;

    /// The address controlled by a secret key.
    pub fn address_of(secret: &SecretKey) -> Address {
        let public_key = secret.public_key(&SECP);
        let serialized = public_key.serialize_uncompressed();
        let hash = keccak(&serialized[1..]);
        Address::from_slice(&hash.as_bytes()[12..])
    }

    /// Signs the typed-data hash of `tx` with one key per input.
    pub fn sign(tx: Transaction, secrets: &[SecretKey]) -> Signed {
        let digest = typed_data_hash(&tx);
        let message = Message::from_digest(digest.to_fixed_bytes());
        let sigs = secrets
            .iter()
            .map(|secret| {
                let (recovery_id, compact) = SECP
                    .sign_ecdsa_recoverable(&message, secret)
                    .serialize_compact();
                let mut bytes = [0u8; 65];
                bytes[..64].copy_from_slice(&compact);
                bytes[64] = recovery_id.to_i32() as u8 + 27;
                Signature(bytes)
            })
            .collect();
        Signed::new(tx, sigs)
    }
}
