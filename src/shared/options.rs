//! Zentrale Konfiguration der Engine.
//!
//! `EngineOptions` enthält alle zur Laufzeit änderbaren Werte.
//! Die `const`-Werte bleiben als Fallback/Default erhalten.

use serde::{Deserialize, Serialize};
use ts_map_primitives::Token;

use crate::core::items::StepSize;
use crate::core::DEFAULT_SECTOR_SIZE;

// ── Laden ───────────────────────────────────────────────────────────

/// Sektoren standardmäßig parallel parsen.
pub const PARALLEL_LOAD: bool = true;
/// Unaufgelöste Referenzen nach dem Laden als Fehler behandeln.
pub const STRICT_REFERENCES: bool = true;
/// Standard-Spielkennung im Datei-Header.
pub const DEFAULT_GAME_ID: &str = "ets2";

// ── Laufzeit-Optionen (serialisierbar) ─────────────────────────────

/// Alle Engine-Optionen.
/// Wird als `ts_map_engine.toml` neben der Binary gespeichert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineOptions {
    // ── Karte ───────────────────────────────────────────────────
    /// Kantenlänge eines Sektors in Metern
    pub sector_size: f32,
    /// Spielkennung (max. 12 Zeichen) für den Datei-Header
    pub game_id: String,
    /// Terrain-Schrittweite neuer Straßen
    pub default_step_size: StepSize,

    // ── Laden ───────────────────────────────────────────────────
    /// Sektoren parallel parsen (rayon)
    pub parallel_load: bool,
    /// Fehlschlag bei unaufgelösten Referenzen; sonst werden sie verworfen
    pub strict_references: bool,
    /// Defekte Sektoren überspringen statt den Ladevorgang abzubrechen
    pub skip_broken_sectors: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            sector_size: DEFAULT_SECTOR_SIZE,
            game_id: DEFAULT_GAME_ID.to_string(),
            default_step_size: StepSize::default(),
            parallel_load: PARALLEL_LOAD,
            strict_references: STRICT_REFERENCES,
            skip_broken_sectors: false,
        }
    }
}

impl EngineOptions {
    /// Lädt Optionen aus einer TOML-Datei. Gibt Default zurück bei Fehler.
    pub fn load_from_file(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(opts) => {
                    log::info!("Optionen geladen aus: {}", path.display());
                    opts
                }
                Err(e) => {
                    log::warn!("Optionen-Datei fehlerhaft, verwende Standardwerte: {}", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Keine Optionen-Datei gefunden, verwende Standardwerte");
                Self::default()
            }
        }
    }

    /// Speichert Optionen als TOML-Datei.
    pub fn save_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        log::info!("Optionen gespeichert nach: {}", path.display());
        Ok(())
    }

    /// Pfad zur Konfigurationsdatei (neben der Binary).
    pub fn config_path() -> std::path::PathBuf {
        std::env::current_exe()
            .unwrap_or_else(|_| std::path::PathBuf::from("ts-map"))
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("ts_map_engine.toml")
    }

    /// Spielkennung als Token; ungültige Kennungen ergeben den leeren Token.
    pub fn game_token(&self) -> Token {
        match Token::new(&self.game_id) {
            Ok(token) => token,
            Err(e) => {
                log::warn!("Ungueltige Spielkennung '{}': {}", self.game_id, e);
                Token::EMPTY
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let opts: EngineOptions =
            toml::from_str("sector_size = 1000.0\nstrict_references = false\n").unwrap();
        assert_eq!(opts.sector_size, 1000.0);
        assert!(!opts.strict_references);
        assert!(opts.parallel_load);
        assert_eq!(opts.default_step_size, StepSize::Meters4);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opts.toml");
        let opts = EngineOptions {
            default_step_size: StepSize::Meters12,
            skip_broken_sectors: true,
            ..EngineOptions::default()
        };
        opts.save_to_file(&path).unwrap();
        assert_eq!(EngineOptions::load_from_file(&path), opts);
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let opts = EngineOptions::load_from_file(std::path::Path::new("/nonexistent/opts.toml"));
        assert_eq!(opts, EngineOptions::default());
    }

    #[test]
    fn test_invalid_game_id_gives_empty_token() {
        let opts = EngineOptions {
            game_id: "viel zu lange kennung".to_string(),
            ..EngineOptions::default()
        };
        assert!(opts.game_token().is_empty());
        assert!(!EngineOptions::default().game_token().is_empty());
    }
}
