//! Referenz auf eine Entität, die während des Ladens noch unaufgelöst sein kann.

/// Verweis auf einen Node oder ein Item.
///
/// Beim Parsen einer Sektor-Datei ist nur die UID bekannt (`Unresolved`).
/// Die globale Auflösungsphase ersetzt jede UID durch das Arena-Handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reference<H> {
    /// Nur die UID ist bekannt
    Unresolved(u64),
    /// Aufgelöstes Arena-Handle
    Resolved(H),
}

impl<H: Copy + PartialEq> Reference<H> {
    /// Gibt das Handle zurück.
    ///
    /// # Panics
    /// Bei einer unaufgelösten Referenz. Nach der Auflösungsphase darf es
    /// keine mehr geben; ein Zugriff vorher ist ein Programmierfehler.
    #[track_caller]
    pub fn handle(&self) -> H {
        match self {
            Reference::Resolved(handle) => *handle,
            Reference::Unresolved(uid) => {
                panic!("unaufgeloeste Referenz {uid:#x} wie aufgeloest verwendet")
            }
        }
    }

    /// Handle falls aufgelöst.
    pub fn resolved(&self) -> Option<H> {
        match self {
            Reference::Resolved(handle) => Some(*handle),
            Reference::Unresolved(_) => None,
        }
    }

    /// UID falls noch unaufgelöst.
    pub fn unresolved_uid(&self) -> Option<u64> {
        match self {
            Reference::Unresolved(uid) => Some(*uid),
            Reference::Resolved(_) => None,
        }
    }

    /// `true` nach erfolgreicher Auflösung.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Resolved(_))
    }

    /// Prüft ob die Referenz auf `handle` zeigt.
    pub fn points_to(&self, handle: H) -> bool {
        self.resolved() == Some(handle)
    }
}

impl<H> From<H> for Reference<H> {
    fn from(handle: H) -> Self {
        Reference::Resolved(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_handle() {
        let reference: Reference<u32> = 7.into();
        assert_eq!(reference.handle(), 7);
        assert!(reference.points_to(7));
        assert_eq!(reference.unresolved_uid(), None);
    }

    #[test]
    #[should_panic(expected = "unaufgeloeste Referenz")]
    fn test_unresolved_handle_panics() {
        let reference: Reference<u32> = Reference::Unresolved(0x42);
        reference.handle();
    }
}
