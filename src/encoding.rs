//! Leaf encoding: Solidity ABI tuple encoding of typed leaf values.
//!
//! A leaf value is an ordered tuple of JSON values, and the [`LeafEncoding`]
//! gives the Solidity type of each position. Values are checked against their
//! declared type and encoded as ABI parameters, so distinct values never share
//! an encoding.

use crate::{
    error::Error,
    hash::{DigestProvider, MerkleHash},
};
use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, B256, I256, U256};
use serde_json::Value;

/// A record committed to by the tree, one JSON value per declared field
pub type LeafValue = Vec<Value>;

/// The declared Solidity types of a leaf, in field order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafEncoding(Vec<DynSolType>);

impl LeafEncoding {
    pub fn new(types: Vec<DynSolType>) -> Self {
        Self(types)
    }

    /// Parse type names such as `["address", "uint256"]`
    pub fn parse<S: AsRef<str>>(types: &[S]) -> Result<Self, Error> {
        types
            .iter()
            .enumerate()
            .map(|(field, ty)| {
                DynSolType::parse(ty.as_ref())
                    .map_err(|e| e.to_string())
                    .and_then(|parsed| check_supported(&parsed).map(|_| parsed))
                    .map_err(|reason| Error::Encoding {
                        field,
                        ty: ty.as_ref().to_string(),
                        reason,
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn types(&self) -> &[DynSolType] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical type names, as written into a tree dump
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

fn check_supported(ty: &DynSolType) -> Result<(), String> {
    match ty {
        DynSolType::Function => Err("function pointers cannot be leaf fields".to_string()),
        DynSolType::Array(inner) | DynSolType::FixedArray(inner, _) => check_supported(inner),
        DynSolType::Tuple(types) => types.iter().try_for_each(check_supported),
        _ => Ok(()),
    }
}

/// ABI-encode a leaf value as a tuple of the declared types
pub fn encode(value: &[Value], encoding: &LeafEncoding) -> Result<Vec<u8>, Error> {
    if value.len() != encoding.len() {
        return Err(Error::Encoding {
            field: value.len().min(encoding.len()),
            ty: "tuple".to_string(),
            reason: format!(
                "expected {} fields, found {}",
                encoding.len(),
                value.len()
            ),
        });
    }
    let fields = encoding
        .types()
        .iter()
        .zip(value)
        .enumerate()
        .map(|(field, (ty, v))| {
            coerce(ty, v).map_err(|reason| Error::Encoding {
                field,
                ty: ty.to_string(),
                reason,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DynSolValue::Tuple(fields).abi_encode_params())
}

/// Leaf digest `H(H(encode(value)))`.
///
/// The second hash keeps a 64-byte leaf encoding from ever being mistaken
/// for the concatenation of two child digests.
pub fn leaf_hash<HF: DigestProvider>(
    value: &[Value],
    encoding: &LeafEncoding,
) -> Result<MerkleHash, Error> {
    let encoded = encode(value, encoding)?;
    Ok(HF::hash(&HF::hash(&encoded)))
}

/// Read a JSON value as an instance of `ty`
fn coerce(ty: &DynSolType, value: &Value) -> Result<DynSolValue, String> {
    match ty {
        DynSolType::Address => parse_address(value).map(DynSolValue::Address),
        DynSolType::Bool => match value {
            Value::Bool(b) => Ok(DynSolValue::Bool(*b)),
            other => Err(format!("expected a boolean, found {}", other)),
        },
        DynSolType::Uint(bits) => {
            let literal = integer_literal(value)?;
            if literal.starts_with('-') {
                return Err("negative value for unsigned type".to_string());
            }
            let n = literal
                .parse::<U256>()
                .map_err(|e| format!("invalid integer `{}`: {}", literal, e))?;
            if n.bit_len() > *bits {
                return Err(format!("value does not fit in {} bits", bits));
            }
            Ok(DynSolValue::Uint(n, *bits))
        }
        DynSolType::Int(bits) => {
            let literal = integer_literal(value)?;
            let n = literal
                .parse::<I256>()
                .map_err(|e| format!("invalid integer `{}`: {}", literal, e))?;
            if (n.bits() as usize) > *bits {
                return Err(format!("value does not fit in {} bits", bits));
            }
            Ok(DynSolValue::Int(n, *bits))
        }
        DynSolType::FixedBytes(len) => {
            let bytes = parse_hex_string(value)?;
            if bytes.len() != *len {
                return Err(format!("expected {} bytes, found {}", len, bytes.len()));
            }
            Ok(DynSolValue::FixedBytes(B256::right_padding_from(&bytes), *len))
        }
        DynSolType::Bytes => parse_hex_string(value).map(DynSolValue::Bytes),
        DynSolType::String => match value {
            Value::String(s) => Ok(DynSolValue::String(s.clone())),
            other => Err(format!("expected a string, found {}", other)),
        },
        DynSolType::Array(inner) => as_array(value)?
            .iter()
            .map(|item| coerce(inner, item))
            .collect::<Result<Vec<_>, _>>()
            .map(DynSolValue::Array),
        DynSolType::FixedArray(inner, len) => {
            let items = as_array(value)?;
            if items.len() != *len {
                return Err(format!("expected {} elements, found {}", len, items.len()));
            }
            items
                .iter()
                .map(|item| coerce(inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::FixedArray)
        }
        DynSolType::Tuple(types) => {
            let items = as_array(value)?;
            if items.len() != types.len() {
                return Err(format!(
                    "expected {} components, found {}",
                    types.len(),
                    items.len()
                ));
            }
            types
                .iter()
                .zip(items)
                .map(|(ty, item)| coerce(ty, item))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::Tuple)
        }
        other => Err(format!("unsupported type `{}`", other)),
    }
}

fn as_array(value: &Value) -> Result<&Vec<Value>, String> {
    value
        .as_array()
        .ok_or_else(|| format!("expected an array, found {}", value))
}

/// Hex address, with or without `0x`. Mixed-case digits must carry a valid
/// EIP-55 checksum.
fn parse_address(value: &Value) -> Result<Address, String> {
    let s = value
        .as_str()
        .ok_or_else(|| format!("expected a hex string, found {}", value))?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.len() != 40 {
        return Err(format!("expected 20 bytes of hex, found `{}`", s));
    }
    let prefixed = format!("0x{}", digits);
    let mixed_case = digits.bytes().any(|b| b.is_ascii_lowercase())
        && digits.bytes().any(|b| b.is_ascii_uppercase());
    if mixed_case {
        Address::parse_checksummed(&prefixed, None)
            .map_err(|e| format!("invalid address `{}`: {}", s, e))
    } else {
        prefixed
            .parse::<Address>()
            .map_err(|e| format!("invalid address `{}`: {}", s, e))
    }
}

fn parse_hex_string(value: &Value) -> Result<Vec<u8>, String> {
    let s = value
        .as_str()
        .ok_or_else(|| format!("expected a hex string, found {}", value))?;
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| format!("missing 0x prefix in `{}`", s))?;
    hex::decode(digits).map_err(|e| format!("invalid hex `{}`: {}", s, e))
}

/// A JSON integer, or a decimal / `0x` hex string, as text for the
/// 256-bit parsers
fn integer_literal(value: &Value) -> Result<String, String> {
    let literal = match value {
        Value::Number(n) if n.is_u64() || n.is_i64() => n.to_string(),
        Value::Number(n) => {
            return Err(format!("{} is not an integer, use a string for large values", n))
        }
        Value::String(s) => s.clone(),
        other => return Err(format!("expected an integer, found {}", other)),
    };
    let unsigned = literal.strip_prefix('-').unwrap_or(&literal);
    let digits = unsigned.strip_prefix("0x").unwrap_or(unsigned);
    let signed_twice = digits.starts_with(|c: char| c == '+' || c == '-');
    if digits.is_empty() || signed_twice || digits.contains('_') {
        return Err(format!("invalid integer `{}`", literal));
    }
    Ok(literal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use serde_json::json;
    use sha3::Keccak256;

    fn encoding(types: &[&str]) -> LeafEncoding {
        LeafEncoding::parse(types).unwrap()
    }

    fn encode_one(ty: &str, value: Value) -> Result<Vec<u8>, Error> {
        encode(&[value], &encoding(&[ty]))
    }

    #[test]
    fn test_parse_types() {
        let parsed = encoding(&["address", "uint", "int24", "bytes32", "bytes", "string"]);
        assert_eq!(
            parsed.types(),
            &[
                DynSolType::Address,
                DynSolType::Uint(256),
                DynSolType::Int(24),
                DynSolType::FixedBytes(32),
                DynSolType::Bytes,
                DynSolType::String,
            ]
        );
        assert_eq!(
            parsed.to_strings(),
            vec!["address", "uint256", "int24", "bytes32", "bytes", "string"]
        );

        let nested = encoding(&["uint8[]", "(bool,address)[2]"]);
        assert_eq!(nested.to_strings(), vec!["uint8[]", "(bool,address)[2]"]);

        let bad = [
            "uint7", "uint264", "int0", "bytes0", "bytes33", "function", "uint256[", "money",
        ];
        for ty in bad {
            assert!(LeafEncoding::parse(&[ty]).is_err(), "{} should not parse", ty);
        }
    }

    #[test]
    fn test_parse_encoding_reports_field() {
        let err = LeafEncoding::parse(&["address", "uint9"]).unwrap_err();
        assert!(matches!(err, Error::Encoding { field: 1, .. }));
    }

    #[test]
    fn test_encode_address_and_uint() {
        let encoded = encode(
            &[json!("0x0000000000000000000000000000000000000001"), json!(1)],
            &encoding(&["address", "uint256"]),
        )
        .unwrap();
        let mut expected = vec![0u8; 64];
        expected[31] = 1;
        expected[63] = 1;
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_leaf_hash_is_double_keccak() {
        let value = vec![json!("0x0000000000000000000000000000000000000001"), json!(1)];
        let encoding = encoding(&["address", "uint256"]);
        let encoded = encode(&value, &encoding).unwrap();
        assert_eq!(
            Keccak256::hash(&encoded),
            hex!("cc69885fda6bcc1a4ace058b4a62bf5e179ea78fd58a1ccd71c22cc9b688792f")
        );
        assert_eq!(
            leaf_hash::<Keccak256>(&value, &encoding).unwrap(),
            hex!("66b32740ad8041bcc3b909c72d7e1afe60094ec55e3cde329b4b3a28501d826c")
        );
    }

    #[test]
    fn test_uint_range() {
        assert!(encode_one("uint8", json!(255)).is_ok());
        assert!(encode_one("uint8", json!(256)).is_err());
        assert!(encode_one("uint8", json!(-1)).is_err());
        assert!(encode_one("uint256", json!(1.5)).is_err());
        assert!(encode_one("uint256", json!("12a")).is_err());
        assert!(encode_one("uint256", json!("")).is_err());

        let max = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        assert_eq!(encode_one("uint256", json!(max)).unwrap(), vec![0xffu8; 32]);
        let overflow =
            "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert!(encode_one("uint256", json!(overflow)).is_err());

        let mut expected = [0u8; 32];
        expected[30] = 0x01;
        expected[31] = 0x00;
        assert_eq!(encode_one("uint16", json!("0x100")).unwrap(), expected);
        assert_eq!(encode_one("uint16", json!("256")).unwrap(), expected);
        assert_eq!(encode_one("uint16", json!(256)).unwrap(), expected);
    }

    #[test]
    fn test_int_twos_complement() {
        assert_eq!(encode_one("int8", json!(-1)).unwrap(), vec![0xffu8; 32]);

        let mut min = [0xffu8; 32];
        min[31] = 0x80;
        assert_eq!(encode_one("int8", json!(-128)).unwrap(), min);
        assert_eq!(encode_one("int8", json!("-128")).unwrap(), min);
        assert!(encode_one("int8", json!(-129)).is_err());
        assert!(encode_one("int8", json!(128)).is_err());

        let mut max = [0u8; 32];
        max[31] = 0x7f;
        assert_eq!(encode_one("int8", json!(127)).unwrap(), max);
        assert_eq!(encode_one("int8", json!("-0")).unwrap(), [0u8; 32]);

        let min256 =
            "-57896044618658097711785492504343953926634992332820282019728792003956564819968";
        let mut expected = [0u8; 32];
        expected[0] = 0x80;
        assert_eq!(encode_one("int256", json!(min256)).unwrap(), expected);
    }

    #[test]
    fn test_address_validation() {
        let bad = [
            json!("0x00000000000000000000000000000000000001"),
            json!("0x000000000000000000000000000000000000000g"),
            json!(1),
        ];
        for value in bad {
            assert!(encode_one("address", value.clone()).is_err(), "{} accepted", value);
        }

        // Without the prefix, as older tooling wrote them
        let bare = encode_one("address", json!("0000000000000000000000000000000000000001"));
        assert_eq!(bare.unwrap()[31], 1);
    }

    #[test]
    fn test_address_checksum() {
        let checksummed = "0xaBCdEf0000000000000000000000000000000001";
        let encoded = encode_one("address", json!(checksummed)).unwrap();
        assert_eq!(&encoded[..12], &[0u8; 12]);
        assert_eq!(&encoded[12..15], &hex!("abcdef"));

        // Single-case hex carries no checksum
        let lower = encode_one("address", json!(checksummed.to_lowercase())).unwrap();
        let upper = encode_one("address", json!(checksummed.to_uppercase().replace("0X", "0x")));
        assert_eq!(lower, encoded);
        assert_eq!(upper.unwrap(), encoded);

        let err = encode_one("address", json!("0xAbCdEf0000000000000000000000000000000001"));
        assert!(matches!(err, Err(Error::Encoding { field: 0, .. })));
    }

    #[test]
    fn test_bool_and_fixed_bytes() {
        assert_eq!(encode_one("bool", json!(true)).unwrap()[31], 1);
        assert_eq!(encode_one("bool", json!(false)).unwrap(), vec![0u8; 32]);
        assert!(encode_one("bool", json!(1)).is_err());

        let encoded = encode_one("bytes4", json!("0x12345678")).unwrap();
        assert_eq!(&encoded[..4], &hex!("12345678"));
        assert_eq!(&encoded[4..], &[0u8; 28]);
        assert!(encode_one("bytes4", json!("0x123456")).is_err());
    }

    #[test]
    fn test_dynamic_types() {
        let encoded = encode_one("string", json!("hello")).unwrap();
        let expected = [
            hex!("0000000000000000000000000000000000000000000000000000000000000020"),
            hex!("0000000000000000000000000000000000000000000000000000000000000005"),
            hex!("68656c6c6f000000000000000000000000000000000000000000000000000000"),
        ]
        .concat();
        assert_eq!(encoded, expected);

        // Offsets point past the head and past earlier tails
        let encoded = encode(
            &[json!("0x"), json!(7), json!("0xff")],
            &encoding(&["bytes", "uint8", "bytes"]),
        )
        .unwrap();
        assert_eq!(encoded.len(), 32 * 3 + 32 + 64);
        assert_eq!(encoded[31], 0x60);
        assert_eq!(encoded[63], 7);
        assert_eq!(encoded[95], 0x80);
        assert_eq!(&encoded[96..128], &[0u8; 32]);
        assert_eq!(encoded[159], 1);
        assert_eq!(encoded[160], 0xff);
    }

    #[test]
    fn test_arrays_and_tuples() {
        let encoded = encode_one("uint8[]", json!([1, 2])).unwrap();
        let expected = [
            hex!("0000000000000000000000000000000000000000000000000000000000000020"),
            hex!("0000000000000000000000000000000000000000000000000000000000000002"),
            hex!("0000000000000000000000000000000000000000000000000000000000000001"),
            hex!("0000000000000000000000000000000000000000000000000000000000000002"),
        ]
        .concat();
        assert_eq!(encoded, expected);

        // Static tuples are inlined in the head
        let encoded = encode_one("(bool,uint16)", json!([true, 7])).unwrap();
        assert_eq!(encoded.len(), 64);
        assert_eq!(encoded[31], 1);
        assert_eq!(encoded[63], 7);

        assert!(encode_one("uint8[2]", json!([1, 2, 3])).is_err());
        assert!(encode_one("uint8[]", json!([1, 256])).is_err());
        assert!(encode_one("(bool,uint16)", json!([true])).is_err());
        assert!(encode_one("uint8[]", json!(1)).is_err());
    }

    #[test]
    fn test_arity_mismatch() {
        let err = encode(&[json!(1)], &encoding(&["uint8", "uint8"])).unwrap_err();
        assert!(matches!(err, Error::Encoding { field: 1, .. }));
    }
}
