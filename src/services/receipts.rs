use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Receipt PDFs stored as flat files under one directory.
///
/// The database keeps only the file name; every name is resolved against
/// `root` and must not contain path components.
#[derive(Debug, Clone)]
pub struct ReceiptStorage {
    root: PathBuf,
}

impl ReceiptStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    fn path_for(&self, file_name: &str) -> Result<PathBuf> {
        let is_plain = !file_name.is_empty()
            && file_name != "."
            && file_name != ".."
            && !file_name.contains(['/', '\\']);

        if !is_plain {
            bail!("Invalid receipt file name: {file_name}");
        }

        Ok(self.root.join(file_name))
    }

    /// Writes a new receipt. Never overwrites an existing file.
    pub async fn write(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(file_name)?;

        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create {}", self.root.display()))?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to create receipt {}", path.display()))?;

        file.write_all(bytes)
            .await
            .with_context(|| format!("Failed to write receipt {}", path.display()))?;
        file.flush().await?;

        debug!(path = %path.display(), size = bytes.len(), "Stored receipt");
        Ok(())
    }

    /// Returns `None` when the file is gone.
    pub async fn read(&self, file_name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(file_name)?;

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read receipt {}", path.display())),
        }
    }

    /// Best-effort removal used to undo a write whose database insert failed.
    pub async fn remove(&self, file_name: &str) {
        let Ok(path) = self.path_for(file_name) else {
            return;
        };

        if let Err(e) = fs::remove_file(&path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), "Failed to remove orphaned receipt: {e}");
        }
    }
}

/// `{external id}_{yyyyMMddHHmmss}_{suffix}.pdf`, with the external id reduced
/// to filesystem-safe characters.
#[must_use]
pub fn receipt_file_name(external_id: &str, at: DateTime<Utc>) -> String {
    let safe_id: String = external_id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let safe_id = if safe_id.is_empty() {
        "client".to_string()
    } else {
        safe_id
    };

    let suffix = uuid::Uuid::new_v4().simple().to_string();

    format!(
        "{}_{}_{}.pdf",
        safe_id,
        at.format("%Y%m%d%H%M%S"),
        &suffix[..8]
    )
}

/// Case-insensitive `.pdf` extension check on the uploaded file name.
#[must_use]
pub fn has_pdf_extension(file_name: &str) -> bool {
    Path::new(file_name.trim())
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_receipt_file_name() {
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();

        let name = receipt_file_name("A-1/../x", at);
        assert!(name.starts_with("A-1____x_20260304050607_"));
        assert!(name.ends_with(".pdf"));
        assert!(!name.contains('/'));

        assert!(receipt_file_name("  ", at).starts_with("client_20260304050607_"));
        assert_ne!(receipt_file_name("7", at), receipt_file_name("7", at));
    }

    #[test]
    fn test_has_pdf_extension() {
        assert!(has_pdf_extension("receipt.pdf"));
        assert!(has_pdf_extension("RECEIPT.PDF"));
        assert!(has_pdf_extension("scan.2026.Pdf"));
        assert!(!has_pdf_extension("receipt.png"));
        assert!(!has_pdf_extension("pdf"));
        assert!(!has_pdf_extension(""));
    }

    #[tokio::test]
    async fn test_write_read_remove() {
        let root = std::env::temp_dir().join(format!("receipts-{}", uuid::Uuid::new_v4()));
        let storage = ReceiptStorage::new(&root);

        storage.write("a.pdf", b"%PDF-1.4").await.unwrap();
        assert_eq!(
            storage.read("a.pdf").await.unwrap().as_deref(),
            Some(&b"%PDF-1.4"[..])
        );

        assert!(storage.write("a.pdf", b"other").await.is_err());
        assert!(storage.write("../escape.pdf", b"x").await.is_err());

        storage.remove("a.pdf").await;
        assert!(storage.read("a.pdf").await.unwrap().is_none());

        let _ = std::fs::remove_dir_all(root);
    }
}
