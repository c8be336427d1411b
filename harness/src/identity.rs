//! Signer identities derived from address-book key material.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::error::{HarnessError, KeyError};
use crate::transaction::{GenerationHash, SignedTransaction, TransactionHash, TransactionType};

const KEY_SIZE: usize = 32;
const ADDRESS_HASH_SIZE: usize = 20;
const ADDRESS_CHECKSUM_SIZE: usize = 3;
pub const ADDRESS_SIZE: usize = 1 + ADDRESS_HASH_SIZE + ADDRESS_CHECKSUM_SIZE;

/// Network identifier reported by the node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NetworkType {
    Mainnet,
    Testnet,
    Private,
    PrivateTest,
}

impl NetworkType {
    pub const fn code(self) -> u8 {
        match self {
            Self::Mainnet => 104,
            Self::Testnet => 152,
            Self::Private => 120,
            Self::PrivateTest => 128,
        }
    }
}

impl TryFrom<u8> for NetworkType {
    type Error = HarnessError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            104 => Ok(Self::Mainnet),
            152 => Ok(Self::Testnet),
            120 => Ok(Self::Private),
            128 => Ok(Self::PrivateTest),
            other => Err(HarnessError::Query {
                query: "network type",
                reason: format!("unknown network type {other}"),
            }),
        }
    }
}

impl From<NetworkType> for u8 {
    fn from(network: NetworkType) -> Self {
        network.code()
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Private => "private",
            Self::PrivateTest => "private-test",
        };
        f.write_str(name)
    }
}

/// Account address: network byte, public key digest and checksum.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub fn from_public_key(public_key: &[u8; KEY_SIZE], network: NetworkType) -> Self {
        let digest = Sha3_256::digest(public_key);
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes[0] = network.code();
        bytes[1..=ADDRESS_HASH_SIZE].copy_from_slice(&digest[..ADDRESS_HASH_SIZE]);
        let checksum = Sha3_256::digest(&bytes[..=ADDRESS_HASH_SIZE]);
        bytes[ADDRESS_HASH_SIZE + 1..].copy_from_slice(&checksum[..ADDRESS_CHECKSUM_SIZE]);
        Self(bytes)
    }

    pub fn network_type(&self) -> Result<NetworkType, HarnessError> {
        NetworkType::try_from(self.0[0])
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| HarnessError::Query {
            query: "address",
            reason,
        };
        let bytes = hex::decode(s).map_err(|err| invalid(err.to_string()))?;
        let bytes: [u8; ADDRESS_SIZE] = bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| invalid(format!("expected {ADDRESS_SIZE} bytes, got {}", bytes.len())))?;
        let checksum = Sha3_256::digest(&bytes[..=ADDRESS_HASH_SIZE]);
        if bytes[ADDRESS_HASH_SIZE + 1..] != checksum[..ADDRESS_CHECKSUM_SIZE] {
            return Err(invalid(format!("checksum mismatch for {s}")));
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = HarnessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

/// Public half of an identity, bound to a network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicAccount {
    #[serde(with = "hex_key")]
    pub public_key: [u8; KEY_SIZE],
    pub network_type: NetworkType,
}

impl PublicAccount {
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key, self.network_type)
    }
}

/// A named signer. The signing key is zeroized on drop and never printed.
#[derive(Clone)]
pub struct Identity {
    signing_key: SigningKey,
    public_account: PublicAccount,
}

impl Identity {
    pub fn from_private_key(private_key: &str, network_type: NetworkType) -> Result<Self, KeyError> {
        let bytes = hex::decode(private_key.trim())?;
        let seed: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| KeyError::Length(bytes.len()))?;
        let signing_key = SigningKey::from_bytes(&seed);
        let public_account = PublicAccount {
            public_key: signing_key.verifying_key().to_bytes(),
            network_type,
        };
        Ok(Self {
            signing_key,
            public_account,
        })
    }

    pub fn public_account(&self) -> &PublicAccount {
        &self.public_account
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode_upper(self.public_account.public_key)
    }

    pub fn address(&self) -> Address {
        self.public_account.address()
    }

    pub fn network_type(&self) -> NetworkType {
        self.public_account.network_type
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Signs `generation_hash || payload` and wraps the result for announcement.
    ///
    /// The payload is opaque here; callers supply an already encoded
    /// transaction body.
    pub fn sign_transaction(
        &self,
        transaction_type: TransactionType,
        payload: &[u8],
        generation_hash: &GenerationHash,
    ) -> SignedTransaction {
        let mut message = Vec::with_capacity(generation_hash.as_bytes().len() + payload.len());
        message.extend_from_slice(generation_hash.as_bytes());
        message.extend_from_slice(payload);
        let signature = self.sign(&message);

        let mut hasher = Sha3_256::new();
        hasher.update(signature);
        hasher.update(self.public_account.public_key);
        hasher.update(generation_hash.as_bytes());
        hasher.update(payload);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&hasher.finalize());

        let mut signed_payload = Vec::with_capacity(signature.len() + payload.len());
        signed_payload.extend_from_slice(&signature);
        signed_payload.extend_from_slice(payload);

        SignedTransaction {
            payload: hex::encode_upper(signed_payload),
            hash: TransactionHash::from_bytes(hash),
            signer: self.public_account,
            transaction_type,
            network_type: self.network_type(),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address())
            .field("network_type", &self.network_type())
            .finish_non_exhaustive()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.public_account == other.public_account
    }
}

impl Eq for Identity {}

mod hex_key {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode_upper(key))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("public key must be 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "575DBB3062267EFF57C970A336EBBC8FBCFE12C5BD3ED7BC11EB0481D7704CED";

    #[test]
    fn derivation_is_deterministic() {
        let a = Identity::from_private_key(KEY, NetworkType::PrivateTest).unwrap();
        let b = Identity::from_private_key(&KEY.to_lowercase(), NetworkType::PrivateTest).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn address_carries_network_and_round_trips_text() {
        let identity = Identity::from_private_key(KEY, NetworkType::Testnet).unwrap();
        let address = identity.address();
        assert_eq!(address.network_type().unwrap(), NetworkType::Testnet);
        let parsed: Address = address.to_string().parse().unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn same_key_on_other_network_gives_other_address() {
        let test = Identity::from_private_key(KEY, NetworkType::Testnet).unwrap();
        let main = Identity::from_private_key(KEY, NetworkType::Mainnet).unwrap();
        assert_eq!(test.public_account().public_key, main.public_account().public_key);
        assert_ne!(test.address(), main.address());
    }

    #[test]
    fn corrupted_address_checksum_is_rejected() {
        let identity = Identity::from_private_key(KEY, NetworkType::Testnet).unwrap();
        let mut text = identity.address().to_string();
        let last = text.pop().unwrap();
        text.push(if last == '0' { '1' } else { '0' });
        assert!(text.parse::<Address>().is_err());
    }

    #[test]
    fn short_key_is_rejected() {
        let err = Identity::from_private_key("0011", NetworkType::Testnet).unwrap_err();
        assert!(matches!(err, KeyError::Length(2)));
        let err = Identity::from_private_key("not-hex", NetworkType::Testnet).unwrap_err();
        assert!(matches!(err, KeyError::Hex(_)));
    }

    #[test]
    fn debug_output_hides_private_key() {
        let identity = Identity::from_private_key(KEY, NetworkType::Testnet).unwrap();
        let rendered = format!("{identity:?}");
        assert!(!rendered.contains(KEY));
        assert!(!rendered.to_lowercase().contains(&KEY.to_lowercase()));
    }

    #[test]
    fn network_type_serializes_as_code() {
        let json = serde_json::to_string(&NetworkType::PrivateTest).unwrap();
        assert_eq!(json, "128");
        let parsed: NetworkType = serde_json::from_str("152").unwrap();
        assert_eq!(parsed, NetworkType::Testnet);
        assert!(serde_json::from_str::<NetworkType>("7").is_err());
    }
}
