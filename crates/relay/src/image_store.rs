//! Bildquelle fuer erkannte Gesichter
//!
//! Zu jeder bekannten Identitaet kann ein Bild `face_<name>.jpg` im
//! konfigurierten Verzeichnis liegen. Fehlt es, wird das Ereignis ohne
//! Bild weitergegeben.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::ResourceError;

/// Liefert das Bild zu einer Identitaet
#[async_trait]
pub trait BildQuelle: Send + Sync + 'static {
    async fn bild_laden(&self, name: &str) -> Result<Bytes, ResourceError>;
}

/// Dateiname des Bildes zu einer Identitaet
///
/// Namen mit Pfadtrennern oder `..` werden abgelehnt, damit keine Datei
/// ausserhalb des Verzeichnisses gelesen werden kann.
pub fn dateiname(name: &str) -> Result<String, ResourceError> {
    if name.is_empty() {
        return Err(ResourceError::bild(name, "Leerer Name"));
    }
    if name.contains(['/', '\\']) || name.contains("..") || name.chars().any(char::is_control) {
        return Err(ResourceError::bild(name, "Unzulaessige Zeichen im Namen"));
    }
    Ok(format!("face_{name}.jpg"))
}

/// Liest Bilder aus einem Verzeichnis
#[derive(Debug, Clone)]
pub struct DateiBildQuelle {
    verzeichnis: PathBuf,
    max_groesse: u64,
}

impl DateiBildQuelle {
    pub fn neu(verzeichnis: impl Into<PathBuf>, max_groesse: u64) -> Self {
        Self {
            verzeichnis: verzeichnis.into(),
            max_groesse,
        }
    }

    pub fn verzeichnis(&self) -> &Path {
        &self.verzeichnis
    }
}

#[async_trait]
impl BildQuelle for DateiBildQuelle {
    async fn bild_laden(&self, name: &str) -> Result<Bytes, ResourceError> {
        let pfad = self.verzeichnis.join(dateiname(name)?);

        let meta = tokio::fs::metadata(&pfad)
            .await
            .map_err(|e| ResourceError::bild(name, e.to_string()))?;
        if !meta.is_file() {
            return Err(ResourceError::bild(name, "Keine regulaere Datei"));
        }
        if meta.len() > self.max_groesse {
            return Err(ResourceError::bild(
                name,
                format!("Bild zu gross: {} Bytes (Maximum: {})", meta.len(), self.max_groesse),
            ));
        }

        let inhalt = tokio::fs::read(&pfad)
            .await
            .map_err(|e| ResourceError::bild(name, e.to_string()))?;

        tracing::debug!(name = name, bytes = inhalt.len(), "Bild geladen");
        Ok(Bytes::from(inhalt))
    }
}
