//! Contract call types and return-data helpers for the handful of calls we make.
//!
//! Fixed calls are declared with `sol!`; the claim event signature comes from
//! config, so its topic is hashed at runtime and its data split into words.

use crate::domain::{AdapterError, AdapterResult};
use alloy_primitives::{hex, keccak256, Address, Bytes, B256, U256, Uint};

/// 10^18, the scale of every token amount we read.
pub const WEI_PER_TOKEN: f64 = 1e18;

alloy_sol_types::sol! {
    #![sol(extra_derives(Debug))]

    function getTotalRewards() external view returns (uint256 total);

    function balanceOf(address owner) external view returns (uint256 balance);
    function tokenOfOwnerByIndex(address owner, uint256 index) external view returns (uint256 tokenId);
    function positions(uint256 tokenId) external view returns (
        uint96 nonce,
        address operator,
        address token0,
        address token1,
        uint24 fee,
        int24 tickLower,
        int24 tickUpper,
        uint128 liquidity,
        uint256 feeGrowthInside0LastX128,
        uint256 feeGrowthInside1LastX128,
        uint128 tokensOwed0,
        uint128 tokensOwed1
    );
    function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address pool);
    function slot0() external view returns (
        uint160 sqrtPriceX96,
        int24 tick,
        uint16 observationIndex,
        uint16 observationCardinality,
        uint16 observationCardinalityNext,
        uint8 feeProtocol,
        bool unlocked
    );

    event Transfer(address indexed from, address indexed to, uint256 value);
}

/// Keccak-256 of a canonical event signature.
pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

pub fn parse_address(address: &str) -> AdapterResult<Address> {
    address
        .trim()
        .parse::<Address>()
        .map_err(|e| AdapterError::decode(format!("invalid address {}: {}", address, e)))
}

/// An address left-padded to a 32-byte topic (for log filters).
pub fn address_topic(address: &str) -> AdapterResult<B256> {
    Ok(parse_address(address)?.into_word())
}

/// `0x`-prefixed hex for JSON-RPC params.
pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    hex::encode_prefixed(bytes)
}

/// Split event data into 32-byte words.
pub fn data_words(data: &str) -> AdapterResult<Vec<U256>> {
    let bytes: Bytes = data
        .parse()
        .map_err(|e| AdapterError::decode(format!("event data is not hex: {}", e)))?;
    if bytes.len() % 32 != 0 {
        return Err(AdapterError::decode(format!(
            "event data is not word aligned ({} bytes)",
            bytes.len()
        )));
    }
    Ok(bytes.chunks_exact(32).map(U256::from_be_slice).collect())
}

/// Parse a hex quantity (`0x1a`) as u64.
pub fn parse_quantity(value: &str) -> AdapterResult<u64> {
    let raw = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(raw, 16).map_err(|e| AdapterError::decode(format!("bad quantity {}: {}", value, e)))
}

/// Any-width unsigned integer as f64 (precision loss beyond 2^53 is fine for display values).
pub fn uint_to_f64<const BITS: usize, const LIMBS: usize>(value: Uint<BITS, LIMBS>) -> f64 {
    value
        .as_limbs()
        .iter()
        .rev()
        .fold(0.0, |acc, limb| acc * 18_446_744_073_709_551_616.0 + *limb as f64)
}

/// A uint256 scaled down by 10^18.
pub fn to_tokens(value: U256) -> f64 {
    uint_to_f64(value) / WEI_PER_TOKEN
}

pub fn to_u64(value: U256) -> AdapterResult<u64> {
    u64::try_from(value).map_err(|_| AdapterError::decode(format!("{} does not fit in u64", value)))
}

/// Round to 4 fraction digits.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::{SolCall, SolEvent};

    #[test]
    fn selectors_match_known_values() {
        assert_eq!(hex::encode(balanceOfCall::SELECTOR), "70a08231");
        assert_eq!(hex::encode(slot0Call::SELECTOR), "3850c7bd");
    }

    #[test]
    fn transfer_topic_is_well_known() {
        let expected = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
        assert_eq!(to_hex(Transfer::SIGNATURE_HASH), expected);
        assert_eq!(to_hex(event_topic("Transfer(address,address,uint256)")), expected);
    }

    #[test]
    fn address_topic_is_left_padded() {
        let topic = address_topic("0x151c2b49CdEC10B150B2763dF3d1C00D70C90956").unwrap();
        assert!(to_hex(topic).starts_with("0x000000000000000000000000151c2b49"));
        assert!(address_topic("0x1234").is_err());
    }

    #[test]
    fn call_data_is_selector_then_words() {
        let owner = parse_address("0x151c2b49CdEC10B150B2763dF3d1C00D70C90956").unwrap();
        let data = balanceOfCall { owner }.abi_encode();
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(data[..4], balanceOfCall::SELECTOR);
    }

    #[test]
    fn decodes_one_and_a_half_tokens() {
        let data = to_hex(U256::from(1_500_000_000_000_000_000u128).to_be_bytes::<32>());
        let words = data_words(&data).unwrap();
        assert_eq!(to_tokens(words[0]), 1.5);
    }

    #[test]
    fn wide_values_convert_to_f64() {
        let q96 = U256::from(1u8) << 96usize;
        assert_eq!(uint_to_f64(q96), 2f64.powi(96));
        assert!(to_u64(q96).is_err());
        assert_eq!(to_u64(U256::from(42u8)).unwrap(), 42);
    }

    #[test]
    fn malformed_event_data_is_an_error() {
        assert!(data_words("0x1234").is_err());
        let not_hex = format!("0x{}é{}", "0".repeat(63), "0".repeat(63));
        assert!(matches!(data_words(&not_hex), Err(AdapterError::Decode(_))));
        assert!(data_words("0x").unwrap().is_empty());
    }

    #[test]
    fn short_return_data_is_an_error() {
        let err = getTotalRewardsCall::abi_decode_returns(&[0u8; 16], true).unwrap_err();
        assert!(matches!(AdapterError::from(err), AdapterError::Abi(_)));
    }

    #[test]
    fn rounds_to_four_digits() {
        assert_eq!(round4(1.234_56), 1.2346);
        assert_eq!(round4(2.0), 2.0);
    }
}
