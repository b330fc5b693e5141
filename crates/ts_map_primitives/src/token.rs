//! Token-Codec: kurze Bezeichner als Ziffern zur Basis 38 in einem `u64`.
//!
//! Alphabet (Index = Ziffernwert): `\0`, `0-9`, `a-z`, `_`.
//! Das erste Zeichen ist die niederwertigste Ziffer.

use std::fmt;

use thiserror::Error;

/// Maximale Länge eines Tokens in Zeichen.
pub const MAX_TOKEN_LENGTH: usize = 12;

const ALPHABET: &[u8; 38] = b"\x000123456789abcdefghijklmnopqrstuvwxyz_";
const BASE: u64 = ALPHABET.len() as u64;

/// Fehler beim Codieren oder Decodieren eines Tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Eingabe länger als [`MAX_TOKEN_LENGTH`]
    #[error("Token '{0}' ist laenger als {MAX_TOKEN_LENGTH} Zeichen")]
    TooLong(String),
    /// Zeichen ausserhalb des Alphabets
    #[error("Token '{token}' enthaelt ungueltiges Zeichen {character:?}")]
    InvalidCharacter {
        /// Eingabe-String
        token: String,
        /// Erstes ungültiges Zeichen
        character: char,
    },
    /// Rohwert ergibt kein gültiges Token (Null-Ziffer mitten im Wort oder zu lang)
    #[error("Wert {0:#x} ist kein gueltiges Token")]
    InvalidValue(u64),
}

/// Ein codierter Kurz-Bezeichner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Token(u64);

impl Token {
    /// Das leere Token (Rohwert 0).
    pub const EMPTY: Token = Token(0);

    /// Codiert einen String. Erlaubt sind `0-9`, `a-z` und `_`.
    pub fn new(text: &str) -> Result<Self, TokenError> {
        encode(text).map(Token)
    }

    /// Übernimmt einen Rohwert ohne Prüfung (z.B. direkt aus einer Datei).
    pub const fn from_raw(value: u64) -> Self {
        Token(value)
    }

    /// Gibt den Rohwert zurück.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// `true` für das leere Token.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Decodiert das Token in seinen String.
    pub fn decode(self) -> Result<String, TokenError> {
        decode(self.0)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match decode(self.0) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "#{:x}", self.0),
        }
    }
}

impl TryFrom<&str> for Token {
    type Error = TokenError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Token::new(value)
    }
}

/// Codiert `text` in den Basis-38-Rohwert.
pub fn encode(text: &str) -> Result<u64, TokenError> {
    if text.chars().count() > MAX_TOKEN_LENGTH {
        return Err(TokenError::TooLong(text.to_string()));
    }

    let mut value = 0u64;
    let mut factor = 1u64;
    for character in text.chars() {
        let digit = char_to_digit(character).ok_or_else(|| TokenError::InvalidCharacter {
            token: text.to_string(),
            character,
        })?;
        value += digit * factor;
        factor = factor.wrapping_mul(BASE);
    }
    Ok(value)
}

/// Decodiert einen Basis-38-Rohwert.
pub fn decode(value: u64) -> Result<String, TokenError> {
    let mut remaining = value;
    let mut text = String::new();
    while remaining > 0 {
        let digit = (remaining % BASE) as usize;
        if digit == 0 || text.len() >= MAX_TOKEN_LENGTH {
            return Err(TokenError::InvalidValue(value));
        }
        text.push(ALPHABET[digit] as char);
        remaining /= BASE;
    }
    Ok(text)
}

fn char_to_digit(character: char) -> Option<u64> {
    match character {
        '0'..='9' => Some(character as u64 - '0' as u64 + 1),
        'a'..='z' => Some(character as u64 - 'a' as u64 + 11),
        '_' => Some(37),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_values() {
        assert_eq!(encode("").unwrap(), 0);
        assert_eq!(encode("0").unwrap(), 1);
        assert_eq!(encode("a").unwrap(), 11);
        assert_eq!(encode("_").unwrap(), 37);
        // "ab": 11 + 12 * 38
        assert_eq!(encode("ab").unwrap(), 11 + 12 * 38);
    }

    #[test]
    fn test_roundtrip_twelve_characters() {
        let token = Token::new("____________").expect("12 Zeichen sind erlaubt");
        assert_eq!(token.decode().unwrap(), "____________");
    }

    #[test]
    fn test_rejects_uppercase_and_length() {
        assert!(matches!(
            Token::new("Ger1"),
            Err(TokenError::InvalidCharacter { character: 'G', .. })
        ));
        assert!(matches!(
            Token::new("abcdefghijklm"),
            Err(TokenError::TooLong(_))
        ));
    }

    #[test]
    fn test_decode_rejects_null_digit_in_word() {
        // Ziffer 0 an Stelle 0, danach 'a'
        let raw = 11 * 38;
        assert_eq!(decode(raw), Err(TokenError::InvalidValue(raw)));
    }

    #[test]
    fn test_display_falls_back_to_hex() {
        let token = Token::from_raw(11 * 38);
        assert_eq!(token.to_string(), format!("#{:x}", 11 * 38));
    }
}
