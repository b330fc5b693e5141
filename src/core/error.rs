//! Fehlertypen der Topologie-Operationen.
//!
//! Jede Operation prüft alle Vorbedingungen bevor sie den Graphen verändert.
//! Ein zurückgegebener Fehler bedeutet daher: Karte unverändert.

use std::fmt;

use thiserror::Error;
use ts_map_primitives::{FlagFieldError, TokenError};

use super::{ItemId, NodeId};

/// Slot-Richtung eines Nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Das Item, das in diesen Node hineinführt
    Backward,
    /// Das Item, das von diesem Node ausgeht
    Forward,
}

impl Direction {
    /// Gegenrichtung.
    pub fn opposite(self) -> Self {
        match self {
            Direction::Backward => Direction::Forward,
            Direction::Forward => Direction::Backward,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Backward => f.write_str("backward"),
            Direction::Forward => f.write_str("forward"),
        }
    }
}

/// Fehler einer Topologie-Operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TopologyError {
    #[error("Node {0:?} existiert nicht")]
    UnknownNode(NodeId),

    #[error("Item {0:?} existiert nicht")]
    UnknownItem(ItemId),

    /// Beide Nodes haben dieselbe Farbe (rot/grün) und passen nicht zusammen
    #[error("Nodes {a:#x} und {b:#x} haben dieselbe Farbe und koennen nicht verbunden werden")]
    SameColor { a: u64, b: u64 },

    /// Der benötigte Slot am Node ist bereits belegt
    #[error("Node {node:#x} ist in Richtung {direction} bereits belegt")]
    EndpointOccupied { node: u64, direction: Direction },

    /// Ziel-Node für den Prefab-Ursprung hängt an einem fremden Item
    #[error("Node {node:#x} von Prefab {prefab:#x} ist bereits mit einem anderen Item verbunden")]
    OriginOccupied { prefab: u64, node: u64 },

    /// Beide Seiten beanspruchen die Anker-Rolle am selben Node
    #[error("Node {0:#x}: Prefab-Ursprung und Strassen-Anfang koennen nicht zusammengelegt werden")]
    BothAnchored(u64),

    #[error("Items {a:#x} und {b:#x} haben keinen gemeinsamen Punkt")]
    NoSharedPosition { a: u64, b: u64 },

    /// Node hängt an einem Item ausserhalb der Auswahl
    #[error("Node {node:#x} wird auch von Items ausserhalb der Auswahl referenziert")]
    SharedOutsideSubset { node: u64 },

    #[error("Item {uid:#x} hat nicht die erwartete Form ({expected})")]
    WrongShape { uid: u64, expected: &'static str },

    #[error("Item {0:#x} gehoert zu einem Compound")]
    NotRootItem(u64),

    #[error("Node {0:#x} kann nicht mit sich selbst verbunden werden")]
    SelfMerge(u64),

    /// Compounds dürfen keine weiteren Compounds enthalten
    #[error("Compound {0:#x} kann kein weiteres Compound aufnehmen")]
    NestedCompound(u64),

    #[error("Index {index} ausserhalb von 0..{len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{field}: Wert {value} ausserhalb des gueltigen Bereichs {min}..={max}")]
    ValueOutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Flags(#[from] FlagFieldError),
}

/// Ergebnis einer Topologie-Operation.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Prüft einen Wert gegen einen geschlossenen Bereich.
pub(crate) fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> TopologyResult<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(TopologyError::ValueOutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
