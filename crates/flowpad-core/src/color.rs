use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// An 8-bit sRGB color as it appears in SVG `fill` / `stroke` attributes.
///
/// Serializes as the same hex string it displays as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::rgb(0xff, 0xff, 0xff);
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    /// Parse `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`.
    ///
    /// The leading `#` is required: the property panel only recognizes
    /// hex notation and treats `rgb(...)`, named colors and `none` as absent.
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().strip_prefix('#')?;
        let bytes = hex.as_bytes();

        match bytes.len() {
            3 | 4 => {
                let nibble = |i: usize| hex_val(bytes[i]).map(|v| v * 17);
                Some(Self {
                    r: nibble(0)?,
                    g: nibble(1)?,
                    b: nibble(2)?,
                    a: if bytes.len() == 4 { nibble(3)? } else { 0xff },
                })
            }
            6 | 8 => {
                let byte = |i: usize| Some(hex_val(bytes[i])? << 4 | hex_val(bytes[i + 1])?);
                Some(Self {
                    r: byte(0)?,
                    g: byte(2)?,
                    b: byte(4)?,
                    a: if bytes.len() == 8 { byte(6)? } else { 0xff },
                })
            }
            _ => None,
        }
    }

    /// `#rrggbb`, lowercase, alpha dropped. This is the value format an
    /// `<input type="color">` accepts.
    pub fn to_swatch(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 0xff {
            f.write_str(&self.to_swatch())
        } else {
            write!(
                f,
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            )
        }
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Rgba::from_hex(&s).ok_or_else(|| serde::de::Error::custom(format!("not a hex color: {s}")))
    }
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_hex_lengths() {
        assert_eq!(Rgba::from_hex("#fff"), Some(Rgba::WHITE));
        assert_eq!(
            Rgba::from_hex("#f008"),
            Some(Rgba {
                r: 0xff,
                g: 0,
                b: 0,
                a: 0x88
            })
        );
        assert_eq!(Rgba::from_hex("#ECECFF"), Some(Rgba::rgb(0xec, 0xec, 0xff)));
        assert_eq!(
            Rgba::from_hex("#9370db80").map(|c| c.a),
            Some(0x80)
        );
    }

    #[test]
    fn rejects_non_hex_notation() {
        assert_eq!(Rgba::from_hex("rgb(1, 2, 3)"), None);
        assert_eq!(Rgba::from_hex("none"), None);
        assert_eq!(Rgba::from_hex("ececff"), None);
        assert_eq!(Rgba::from_hex("#ggg"), None);
        assert_eq!(Rgba::from_hex("#12345"), None);
    }

    #[test]
    fn swatch_is_lowercase_six_digits() {
        let c = Rgba::from_hex("#ABCDEF80").unwrap();
        assert_eq!(c.to_swatch(), "#abcdef");
        assert_eq!(c.to_string(), "#abcdef80");
        assert_eq!(Rgba::BLACK.to_string(), "#000000");
    }

    #[test]
    fn serde_uses_hex_strings() {
        let c = Rgba::rgb(0x12, 0x34, 0x56);
        assert_eq!(serde_json::to_string(&c).unwrap(), "\"#123456\"");
        let back: Rgba = serde_json::from_str("\"#123456\"").unwrap();
        assert_eq!(back, c);
        assert!(serde_json::from_str::<Rgba>("\"teal\"").is_err());
    }
}
