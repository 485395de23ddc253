use crate::access::artifact::Artifact;
use crate::access::error::AccessError;
use glob::{glob, Pattern};
use std::path::{Path, PathBuf};

/// First file named like `artifact` anywhere under `root`, trying each extension in
/// order. A `root` that is itself a file is returned unchanged.
pub fn find_artifact(root: &Path, artifact: Artifact) -> Result<Option<PathBuf>, AccessError> {
    if root.is_file() {
        return Ok(Some(root.to_path_buf()));
    }
    let escaped_root = Pattern::escape(&root.to_string_lossy());
    for extension in artifact.extensions() {
        let pattern = format!("{escaped_root}/**/{}.{extension}", artifact.file_stem());
        let mut matches = glob(&pattern)
            .map_err(|e| AccessError::SearchPattern(root.to_path_buf(), e))?
            .filter_map(Result::ok);
        if let Some(path) = matches.next() {
            log::debug!("Found {artifact} at {}", path.display());
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Like [`find_artifact`], failing with [`AccessError::ArtifactNotFound`].
pub fn locate_artifact(root: &Path, artifact: Artifact) -> Result<PathBuf, AccessError> {
    find_artifact(root, artifact)?.ok_or_else(|| AccessError::ArtifactNotFound {
        artifact,
        root: root.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_recursive_search_prefers_feather() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("processed").join("2023");
        fs::create_dir_all(&nested)?;
        fs::write(nested.join("weather_data.parquet"), b"")?;
        fs::write(dir.path().join("weather_data.feather"), b"")?;

        let found = locate_artifact(dir.path(), Artifact::Weather)?;
        assert_eq!(found, dir.path().join("weather_data.feather"));

        let parquet = locate_artifact(&dir.path().join("processed"), Artifact::Weather)?;
        assert_eq!(parquet, nested.join("weather_data.parquet"));
        Ok(())
    }

    #[test]
    fn test_file_path_is_used_directly() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("anything.feather");
        fs::write(&file, b"")?;
        assert_eq!(locate_artifact(&file, Artifact::Traffic)?, file);
        Ok(())
    }

    #[test]
    fn test_missing_artifact() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("traffic_data.csv"), b"")?;
        let result = locate_artifact(dir.path(), Artifact::Traffic);
        assert!(matches!(
            result,
            Err(AccessError::ArtifactNotFound { artifact: Artifact::Traffic, .. })
        ));
        assert_eq!(find_artifact(dir.path(), Artifact::Traffic)?, None);
        Ok(())
    }
}
