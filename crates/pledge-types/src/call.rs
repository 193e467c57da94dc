use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{AccountId, Balance, Gas};

/// How a promise relates to its dependency set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    /// Waits for all listed parents, then executes a call of its own.
    Sequential,
    /// Pure synchronization node fanning several promises into one
    /// dependency set. Carries no call.
    Joined,
}

/// One deferred cross-contract call: target, method selector, argument
/// payload, attached value, declared gas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromiseCall {
    pub target: AccountId,
    pub method: String,
    #[serde(with = "serde_bytes")]
    pub args: Vec<u8>,
    #[serde(with = "balance_serde")]
    pub attached_value: Balance,
    pub static_gas: Gas,
}

impl PromiseCall {
    /// Decode the argument payload as canonical CBOR.
    pub fn args<T: DeserializeOwned>(&self) -> Result<T, serde_cbor::Error> {
        serde_cbor::from_slice(&self.args)
    }
}

/// Balances are 128-bit; CBOR integers cap at 64. Encode as a decimal string
/// on the wire, the way ledger-facing APIs conventionally do.
pub mod balance_serde {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S>(value: &u128, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse::<u128>()
            .map_err(|err| D::Error::custom(format!("invalid balance '{text}': {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_round_trip_preserves_balance_width() {
        let call = PromiseCall {
            target: AccountId::new("token.factory").unwrap(),
            method: "transfer".into(),
            args: serde_cbor::to_vec(&("bob", 25u64)).unwrap(),
            attached_value: u128::from(u64::MAX) + 1,
            static_gas: 30,
        };
        let bytes = serde_cbor::to_vec(&call).unwrap();
        let decoded: PromiseCall = serde_cbor::from_slice(&bytes).unwrap();
        assert_eq!(decoded, call);

        let (to, amount): (String, u64) = decoded.args().unwrap();
        assert_eq!(to, "bob");
        assert_eq!(amount, 25);
    }
}
