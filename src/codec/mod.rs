pub mod instruction;
pub mod market;
pub mod state;

use solana_pubkey::Pubkey;

use crate::error::Error;

pub const PUBKEY_LEN: usize = 32;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    strum_macros::Display,
    strum_macros::AsRefStr,
    strum_macros::EnumString,
    strum_macros::FromRepr,
)]
#[repr(u8)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid = 0,
    Ask = 1,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    strum_macros::Display,
    strum_macros::AsRefStr,
    strum_macros::EnumString,
    strum_macros::FromRepr,
)]
#[repr(u8)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Limit = 0,
    ImmediateOrCancel = 1,
    PostOnly = 2,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    strum_macros::Display,
    strum_macros::AsRefStr,
    strum_macros::EnumString,
    strum_macros::FromRepr,
)]
#[repr(u8)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SelfTradeBehavior {
    DecrementTake = 0,
    CancelProvide = 1,
    AbortTransaction = 2,
}

/// Base58 rendering of a key, used for logs and caller-facing records.
pub fn pubkey_to_string(key: &Pubkey) -> String {
    bs58::encode(key.as_ref()).into_string()
}

pub fn parse_pubkey(value: &str) -> Result<Pubkey, Error> {
    let bytes = bs58::decode(value)
        .into_vec()
        .map_err(|e| Error::format(format!("invalid base58 key {value}: {e}")))?;
    let array: [u8; PUBKEY_LEN] = bytes
        .try_into()
        .map_err(|_| Error::format(format!("key {value} is not 32 bytes")))?;
    Ok(Pubkey::new_from_array(array))
}

pub fn is_zero_key(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| *b == 0)
}

pub(crate) fn checked_u16(value: usize, field: &'static str) -> Result<u16, Error> {
    u16::try_from(value).map_err(|_| Error::Overflow {
        field,
        value: value as u128,
    })
}

pub(crate) fn checked_u64(value: usize, field: &'static str) -> Result<u64, Error> {
    u64::try_from(value).map_err(|_| Error::Overflow {
        field,
        value: value as u128,
    })
}

pub(crate) fn read_array<const N: usize>(
    input: &mut &[u8],
    field: &str,
) -> Result<[u8; N], Error> {
    let (bytes, rest) = input
        .split_first_chunk::<N>()
        .ok_or_else(|| Error::format(format!("buffer too short for {field}")))?;
    *input = rest;
    Ok(*bytes)
}

pub(crate) fn read_u8(input: &mut &[u8], field: &str) -> Result<u8, Error> {
    read_array::<1>(input, field).map(|[b]| b)
}

pub(crate) fn read_u16(input: &mut &[u8], field: &str) -> Result<u16, Error> {
    read_array(input, field).map(u16::from_le_bytes)
}

pub(crate) fn read_u32(input: &mut &[u8], field: &str) -> Result<u32, Error> {
    read_array(input, field).map(u32::from_le_bytes)
}

pub(crate) fn read_u64(input: &mut &[u8], field: &str) -> Result<u64, Error> {
    read_array(input, field).map(u64::from_le_bytes)
}

pub(crate) fn read_u128(input: &mut &[u8], field: &str) -> Result<u128, Error> {
    read_array(input, field).map(u128::from_le_bytes)
}

pub(crate) fn read_pubkey(input: &mut &[u8], field: &str) -> Result<Pubkey, Error> {
    read_array(input, field).map(Pubkey::new_from_array)
}

/// Reads `bytes[start..start + N]` without advancing any cursor.
pub(crate) fn array_at<const N: usize>(
    bytes: &[u8],
    start: usize,
    field: &str,
) -> Result<[u8; N], Error> {
    let mut slice = bytes
        .get(start..)
        .ok_or_else(|| Error::format(format!("offset {start} out of bounds for {field}")))?;
    read_array(&mut slice, field)
}

pub(crate) fn pubkey_at(bytes: &[u8], start: usize, field: &str) -> Result<Pubkey, Error> {
    array_at(bytes, start, field).map(Pubkey::new_from_array)
}
