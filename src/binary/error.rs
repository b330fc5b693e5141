//! Fehler beim Lesen und Schreiben der Sektor-Dateien.

use thiserror::Error;

use crate::core::SectorCoord;

/// Defekte oder nicht unterstützte Eingabe.
///
/// Wird im Loader/Saver in `anyhow::Error` mit Dateikontext verpackt und
/// lässt sich per `downcast_ref::<FormatError>()` zurückgewinnen.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("Unerwartetes Dateiende bei Offset {offset}: {needed} Bytes benoetigt")]
    Truncated { offset: usize, needed: usize },

    #[error("Formatversion {found} wird nicht unterstuetzt (erlaubt {min}..={max})")]
    UnsupportedVersion { found: u32, min: u32, max: u32 },

    /// Sektor-Koordinate im Header passt nicht zum Dateinamen
    #[error("Datei gehoert zu Sektor {found}, erwartet {expected}")]
    SectorMismatch {
        expected: SectorCoord,
        found: SectorCoord,
    },

    #[error("Unbekannter Item-Typ {tag} bei Offset {offset}")]
    UnknownItemType { tag: u32, offset: usize },

    #[error("Compound {0:#x} enthaelt ein weiteres Compound")]
    NestedCompound(u64),

    #[error("{count} ueberzaehlige Bytes nach dem letzten Datensatz")]
    TrailingData { count: usize },

    #[error("Zusatzdaten-Datei endet ohne Abschlusskennung")]
    MissingSentinel,

    #[error("Ungueltiger Wert fuer {field}: {value}")]
    InvalidValue { field: &'static str, value: u64 },

    #[error("{field}: Wert {value} ist nicht speicherbar")]
    ValueOutOfRange { field: &'static str, value: u64 },

    #[error("Referenz auf {kind} {uid:#x} konnte nicht aufgeloest werden")]
    UnresolvedReference { kind: &'static str, uid: u64 },
}

pub type FormatResult<T> = Result<T, FormatError>;
