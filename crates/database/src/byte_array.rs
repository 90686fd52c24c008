use sqlx::{
    Decode, Encode, Postgres, Type,
    encode::IsNull,
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgHasArrayType, PgTypeInfo, PgValueRef},
};

/// Fixed size byte array stored as `bytea`. Wallet addresses and
/// transaction hashes use this instead of locally generated keys.
#[derive(Clone, Copy, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ByteArray<const N: usize>(pub [u8; N]);

impl<const N: usize> Default for ByteArray<N> {
    fn default() -> Self {
        Self([0u8; N])
    }
}

impl<const N: usize> std::fmt::Debug for ByteArray<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl<const N: usize> ByteArray<N> {
    /// Parses a `0x` prefixed hex string of exactly `N` bytes.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; N];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl<const N: usize> Type<Postgres> for ByteArray<N> {
    fn type_info() -> PgTypeInfo {
        <Vec<u8> as Type<Postgres>>::type_info()
    }
}

impl<const N: usize> PgHasArrayType for ByteArray<N> {
    fn array_type_info() -> PgTypeInfo {
        <Vec<u8> as PgHasArrayType>::array_type_info()
    }
}

impl<'r, const N: usize> Decode<'r, Postgres> for ByteArray<N> {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let bytes = <&[u8] as Decode<Postgres>>::decode(value)?;
        Ok(Self(bytes.try_into()?))
    }
}

impl<'q, const N: usize> Encode<'q, Postgres> for ByteArray<N> {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <&[u8] as Encode<Postgres>>::encode_by_ref(&self.0.as_slice(), buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let address = ByteArray::<20>([0x11; 20]);
        let hex = address.to_hex();
        assert_eq!(hex, format!("0x{}", "11".repeat(20)));
        assert_eq!(ByteArray::<20>::from_hex(&hex).unwrap(), address);
    }

    #[test]
    fn from_hex_accepts_unprefixed() {
        let hex = "22".repeat(32);
        assert_eq!(
            ByteArray::<32>::from_hex(&hex).unwrap(),
            ByteArray::<32>([0x22; 32])
        );
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(ByteArray::<20>::from_hex("0x1234").is_err());
    }

    #[test]
    fn debug_prints_hex() {
        let hash = ByteArray::<4>([0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(format!("{hash:?}"), "0xdeadbeef");
    }
}
