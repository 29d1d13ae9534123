use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ManifestError;

// ═══════════════════════════════════════════════════════════════
//  RecoveryManifest
// ═══════════════════════════════════════════════════════════════

/// Всё, что backfill создал временно и что нужно удалить потом.
///
/// `temporary_topic_id == None` — topic не создавался, а был
/// переиспользован существующий.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryManifest {
    pub temporary_topic_id: Option<String>,
    #[serde(default)]
    pub temporary_trigger_resource_ids: Vec<String>,
}

impl RecoveryManifest {
    pub fn is_empty(&self) -> bool {
        self.temporary_topic_id.is_none() && self.temporary_trigger_resource_ids.is_empty()
    }

    /// Сколько ресурсов перечислено в manifest'е.
    pub fn resource_count(&self) -> usize {
        self.temporary_trigger_resource_ids.len() + usize::from(self.temporary_topic_id.is_some())
    }

    pub async fn read(path: &Path) -> Result<Self, ManifestError> {
        let content = tokio::fs::read(path).await.map_err(|e| io_err(path, e))?;
        serde_json::from_slice(&content).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Записать целиком: `<path>.tmp` → rename. Частично записанного
    /// manifest'а на диске не бывает.
    pub async fn write(&self, path: &Path) -> Result<(), ManifestError> {
        let bytes = self.to_bytes(path)?;
        let tmp = tmp_path(path);
        if let Some(parent) = non_empty_parent(path) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| io_err(parent, e))?;
        }
        tokio::fs::write(&tmp, &bytes).await.map_err(|e| io_err(&tmp, e))?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| io_err(path, e))
    }

    /// Блокирующий вариант `write` для Drop-контекстов.
    pub fn write_blocking(&self, path: &Path) -> Result<(), ManifestError> {
        let bytes = self.to_bytes(path)?;
        let tmp = tmp_path(path);
        if let Some(parent) = non_empty_parent(path) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        std::fs::write(&tmp, &bytes).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))
    }

    fn to_bytes(&self, path: &Path) -> Result<Vec<u8>, ManifestError> {
        let mut bytes = serde_json::to_vec_pretty(self).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

fn io_err(path: &Path, source: std::io::Error) -> ManifestError {
    ManifestError::Io { path: path.to_path_buf(), source }
}
