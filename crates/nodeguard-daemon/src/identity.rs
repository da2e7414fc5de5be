use nodeguard_types::{GuardError, GuardResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct NodeData {
    #[serde(default)]
    id: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Returns the persisted node id, generating and storing one on first use.
/// Unknown keys in the file are preserved.
pub fn ensure_node_id(path: &Path) -> GuardResult<String> {
    let mut data = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GuardError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str::<NodeData>(&contents)
            .map_err(|e| GuardError::Config(format!("Invalid node data {}: {}", path.display(), e)))?
    } else {
        NodeData::default()
    };

    if let Some(id) = data.id.as_ref().filter(|id| !id.trim().is_empty()) {
        return Ok(id.clone());
    }

    let id = Uuid::new_v4().to_string();
    data.id = Some(id.clone());
    write_atomic(path, &data)?;
    info!("Generated node id {}", id);

    Ok(id)
}

/// The stored node id without creating one.
pub fn read_node_id(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str::<NodeData>(&contents)
        .ok()?
        .id
        .filter(|id| !id.trim().is_empty())
}

fn write_atomic(path: &Path, data: &NodeData) -> GuardResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = serde_json::to_string_pretty(data)
        .map_err(|e| GuardError::Internal(format!("Failed to serialize node data: {}", e)))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)
        .map_err(|e| GuardError::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| GuardError::Io(format!("Failed to replace {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodedata.json");

        let first = ensure_node_id(&path).unwrap();
        let second = ensure_node_id(&path).unwrap();
        assert_eq!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
        assert!(!dir.path().join("nodedata.json.tmp").exists());
    }

    #[test]
    fn test_existing_fields_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodedata.json");
        std::fs::write(&path, r#"{"registered": true}"#).unwrap();

        let id = ensure_node_id(&path).unwrap();
        let stored: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored["id"], id.as_str());
        assert_eq!(stored["registered"], true);
    }

    #[test]
    fn test_read_does_not_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodedata.json");
        assert_eq!(read_node_id(&path), None);
        assert!(!path.exists());

        let id = ensure_node_id(&path).unwrap();
        assert_eq!(read_node_id(&path), Some(id));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodedata.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(ensure_node_id(&path).is_err());
    }
}
