//! Reading and writing spec files.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::{CorrespondenceSpec, SpecError, SpecResult, TileSpec};

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> SpecResult<T> {
    let text = fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| SpecError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Read a tile-spec file (a JSON array of tiles).
///
/// # Errors
///
/// [`SpecError::Io`] and [`SpecError::Parse`].
pub fn read_tile_specs(path: impl AsRef<Path>) -> SpecResult<Vec<TileSpec>> {
    let path = path.as_ref();
    let tiles: Vec<TileSpec> = read_json(path)?;
    debug!(path = %path.display(), tiles = tiles.len(), "read tile specs");
    Ok(tiles)
}

/// Write a tile-spec file as pretty-printed JSON.
///
/// # Errors
///
/// [`SpecError::Io`] on write failures.
pub fn write_tile_specs(path: impl AsRef<Path>, tiles: &[TileSpec]) -> SpecResult<()> {
    let path = path.as_ref();
    let text = serde_json::to_string_pretty(tiles).map_err(|e| SpecError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    fs::write(path, text).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a correspondence file (a JSON array of records).
///
/// # Errors
///
/// [`SpecError::Io`] and [`SpecError::Parse`].
pub fn read_correspondences(path: impl AsRef<Path>) -> SpecResult<Vec<CorrespondenceSpec>> {
    let path = path.as_ref();
    let specs: Vec<CorrespondenceSpec> = read_json(path)?;
    debug!(path = %path.display(), records = specs.len(), "read correspondences");
    Ok(specs)
}

/// Expand a file-list argument: a single argument that does not name a
/// `.json` file is treated as a line-separated list of files.
///
/// # Errors
///
/// [`SpecError::Io`] when the list file cannot be read.
pub fn expand_file_args(args: &[String]) -> SpecResult<Vec<String>> {
    if args.len() == 1 && !args[0].ends_with(".json") {
        let path = Path::new(&args[0]);
        let text = fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect());
    }
    Ok(args.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "align-spec-io-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn tile_specs_round_trip_through_disk() {
        let dir = temp_dir();
        let path = dir.join("tiles.json");
        let tiles: Vec<TileSpec> = serde_json::from_str(
            r#"[{"tileId": "a", "layer": 1, "transforms": []}]"#,
        )
        .unwrap();
        write_tile_specs(&path, &tiles).unwrap();
        let back = read_tile_specs(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].tile_id.as_deref(), Some("a"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_tile_specs("/nonexistent/nowhere.json").unwrap_err();
        assert!(matches!(err, SpecError::Io { .. }));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let dir = temp_dir();
        let path = dir.join("garbage.json");
        fs::write(&path, "{not json").unwrap();
        let err = read_tile_specs(&path).unwrap_err();
        assert!(matches!(err, SpecError::Parse { .. }));
    }

    #[test]
    fn single_list_file_is_expanded() {
        let dir = temp_dir();
        let list = dir.join("files.txt");
        fs::write(&list, "a.json\n\n  b.json\n").unwrap();
        let args = vec![list.to_string_lossy().to_string()];
        let expanded = expand_file_args(&args).unwrap();
        assert_eq!(expanded, vec!["a.json".to_string(), "b.json".to_string()]);
    }

    #[test]
    fn json_arguments_pass_through() {
        let args = vec!["a.json".to_string()];
        assert_eq!(expand_file_args(&args).unwrap(), args);
        let two = vec!["x".to_string(), "y".to_string()];
        assert_eq!(expand_file_args(&two).unwrap(), two);
    }
}
