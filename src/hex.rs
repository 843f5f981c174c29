use std::fmt;

/// Encode `data` as a lowercase hex string.
pub(crate) fn encode(data: impl AsRef<[u8]>) -> String {
    HexString(data).to_string()
}

/// Display a byte buffer as hex string, without allocating.
pub(crate) struct HexString<T>(pub T);

impl<T: AsRef<[u8]>> fmt::Display for HexString<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0
            .as_ref()
            .iter()
            .try_for_each(|byte| write!(f, "{:02x}", byte))
    }
}

#[test]
fn encode_bytes() {
    assert_eq!(encode(b"\x01\x20\xf0"), "0120f0");
    assert_eq!(HexString(b"\x01\x20\xf0").to_string(), "0120f0");
}
