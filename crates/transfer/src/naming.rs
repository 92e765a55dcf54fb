use std::path::{Component, Path};

use crate::TransferError;

/// Derives the filename announced to the server from a local path.
///
/// Only the final component is sent; directories of the local path never
/// leave the machine.
///
/// Rejects:
/// - Empty paths
/// - Paths ending in `..` or a root/prefix (no file name)
/// - Names containing line breaks
pub fn remote_file_name(path: &Path) -> Result<String, TransferError> {
    let last = path.components().next_back().ok_or_else(|| {
        TransferError::InvalidFileName("empty path".into())
    })?;

    let name = match last {
        Component::Normal(name) => name.to_string_lossy().into_owned(),
        Component::ParentDir | Component::CurDir | Component::RootDir | Component::Prefix(_) => {
            return Err(TransferError::InvalidFileName(format!(
                "no file name in path: {}",
                path.display()
            )));
        }
    };

    if name.contains(['\r', '\n']) {
        return Err(TransferError::InvalidFileName(format!(
            "line break in file name: {}",
            name.escape_debug()
        )));
    }

    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(p: &str) -> Result<String, TransferError> {
        remote_file_name(Path::new(p))
    }

    #[test]
    fn strips_directories() {
        assert_eq!(name("/var/uploads/report.pdf").unwrap(), "report.pdf");
        assert_eq!(name("sub/dir/file.txt").unwrap(), "file.txt");
    }

    #[test]
    fn accepts_simple_filename() {
        assert_eq!(name("game.exe").unwrap(), "game.exe");
    }

    #[test]
    fn accepts_dotfile() {
        assert_eq!(name(".config/settings.json").unwrap(), "settings.json");
        assert_eq!(name("/home/u/.bashrc").unwrap(), ".bashrc");
    }

    #[test]
    fn accepts_current_dir_prefix() {
        assert_eq!(name("./game.exe").unwrap(), "game.exe");
    }

    #[test]
    fn trailing_separator_uses_last_component() {
        assert_eq!(name("dir/file.txt/").unwrap(), "file.txt");
    }

    #[test]
    fn rejects_empty_path() {
        assert!(name("").is_err());
    }

    #[test]
    fn rejects_parent_dir() {
        assert!(name("..").is_err());
        assert!(name("a/b/..").is_err());
    }

    #[test]
    fn rejects_root() {
        assert!(name("/").is_err());
    }

    #[test]
    fn rejects_line_breaks() {
        assert!(name("bad\nname.txt").is_err());
    }
}
