use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A BUFR descriptor F-X-Y, packed on the wire as two octets:
/// F in the top 2 bits, X in the next 6, Y in the low 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Descriptor {
    pub f: u8,
    pub x: u8,
    pub y: u8,
}

impl Descriptor {
    pub const fn new(f: u8, x: u8, y: u8) -> Self {
        Descriptor { f, x, y }
    }

    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Descriptor {
            f: bytes[0] >> 6,
            x: bytes[0] & 0x3F,
            y: bytes[1],
        }
    }

    pub fn to_bytes(self) -> [u8; 2] {
        [(self.f << 6) | (self.x & 0x3F), self.y]
    }

    /// Parses the textual forms used by WMO table files: "001001" or "0 01 001".
    pub fn from_str(s: &str) -> Result<Self> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.len() != 6 || !compact.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::ParseError(format!("Invalid FXY notation: {:?}", s)));
        }
        let f = compact[0..1]
            .parse::<u8>()
            .map_err(|_| Error::ParseError(format!("Invalid FXY notation: {:?}", s)))?;
        let x = compact[1..3]
            .parse::<u8>()
            .map_err(|_| Error::ParseError(format!("Invalid FXY notation: {:?}", s)))?;
        let y = compact[3..6]
            .parse::<u8>()
            .map_err(|_| Error::ParseError(format!("Invalid FXY notation: {:?}", s)))?;
        Ok(Descriptor { f, x, y })
    }

    pub fn is_element(&self) -> bool {
        self.f == 0
    }

    pub fn is_replication(&self) -> bool {
        self.f == 1
    }

    pub fn is_operator(&self) -> bool {
        self.f == 2
    }

    pub fn is_sequence(&self) -> bool {
        self.f == 3
    }

    /// Delayed-replication factors live in class 31 and are exempt from
    /// operator modifications and from the all-ones missing convention.
    pub fn is_replication_factor(&self) -> bool {
        self.f == 0 && self.x == 31
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:02} {:03}", self.f, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_and_unpacks_two_octets() {
        let d = Descriptor::new(3, 7, 192);
        assert_eq!(Descriptor::from_bytes(d.to_bytes()), d);

        // 0b00_000010, 0b00000001 => 0 02 001
        let d = Descriptor::from_bytes([0x02, 0x01]);
        assert_eq!(d, Descriptor::new(0, 2, 1));
    }

    #[test]
    fn parses_wmo_notation() {
        assert_eq!(
            Descriptor::from_str("001001").unwrap(),
            Descriptor::new(0, 1, 1)
        );
        assert_eq!(
            Descriptor::from_str("3 02 032").unwrap(),
            Descriptor::new(3, 2, 32)
        );
        assert!(Descriptor::from_str("01001").is_err());
        assert!(Descriptor::from_str("00100a").is_err());
    }

    #[test]
    fn displays_spaced_form() {
        assert_eq!(Descriptor::new(0, 2, 1).to_string(), "0 02 001");
        assert_eq!(Descriptor::new(2, 1, 132).to_string(), "2 01 132");
    }

    #[test]
    fn classifies_by_f() {
        assert!(Descriptor::new(0, 12, 101).is_element());
        assert!(Descriptor::new(1, 1, 0).is_replication());
        assert!(Descriptor::new(2, 1, 0).is_operator());
        assert!(Descriptor::new(3, 2, 32).is_sequence());
        assert!(Descriptor::new(0, 31, 1).is_replication_factor());
        assert!(!Descriptor::new(0, 30, 1).is_replication_factor());
    }
}
