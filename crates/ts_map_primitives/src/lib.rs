//! `ts_map_primitives`: Low-Level-Bausteine fuer das Sektor-Binaerformat.
//!
//! Enthaelt die Dienste, die der Map-Kern als Black-Box nutzt:
//! - [`Token`]: positionscodierte Kurz-Bezeichner (max. 12 Zeichen) in einem `u64`
//! - [`FlagField`]: 32-Bit-Flagfeld mit Einzelbit-, Byte- und Bitstring-Zugriff
//! - [`spline`]: Hermite-/Catmull-Rom-Auswertung, Ableitung und Bogenlaenge
//!
//! # Beispiel
//! ```
//! use ts_map_primitives::{FlagField, Token};
//!
//! let token = Token::new("ger1")?;
//! assert_eq!(token.to_string(), "ger1");
//!
//! let mut flags = FlagField::default();
//! flags.set(3, true);
//! flags.set_bit_string(4, 2, 0b10)?;
//! assert_eq!(flags.bits(), 0b10_1000);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod flag_field;
pub mod spline;
pub mod token;

pub use flag_field::{FlagField, FlagFieldError};
pub use token::{Token, TokenError, MAX_TOKEN_LENGTH};
