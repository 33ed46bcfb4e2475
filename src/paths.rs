use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::constants::{GZIP_EXTENSIONS, UNSUPPORTED_ARCHIVE_EXTENSIONS};

static HTTP_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://([\w-]+\.)*[\w-]+(:\d{1,5})?(/[\w\-./?%&=~+:@,;]*)?$")
        .expect("static URL pattern compiles")
});

pub fn is_http_url(locator: &str) -> bool {
    HTTP_URL.is_match(locator)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn is_gzip_path(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| GZIP_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_unsupported_archive(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| UNSUPPORTED_ARCHIVE_EXTENSIONS.contains(&ext.as_str()))
}

/// Random path inside `dir` that names neither a file nor a directory right now.
pub fn pick_random_file_path(dir: &Path, extension: Option<&str>) -> PathBuf {
    loop {
        let mut name = Uuid::new_v4().simple().to_string();
        if let Some(ext) = extension.map(|e| e.trim_start_matches('.')).filter(|e| !e.is_empty()) {
            name.push('.');
            name.push_str(ext);
        }

        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
    }
}

pub fn is_file_readable_and_not_empty(path: &Path) -> bool {
    if !path.is_file() {
        info!("File '{}' does not exist", path.display());
        return false;
    }

    let mut probe = [0u8; 1];
    match fs::File::open(path).and_then(|mut file| file.read(&mut probe)) {
        Ok(0) => {
            info!("File '{}' is empty", path.display());
            false
        }
        Ok(_) => true,
        Err(e) => {
            info!("Failed to read file '{}': {}", path.display(), e);
            false
        }
    }
}

/// Checks a path can be opened for writing. A file created by the check is removed again.
pub fn is_file_writable(path: &Path) -> bool {
    let already_exists = path.exists();

    let writable = match OpenOptions::new().write(true).create(true).truncate(false).open(path) {
        Ok(_) => true,
        Err(e) => {
            info!("Failed to open/create for writing file '{}': {}", path.display(), e);
            false
        }
    };

    if !already_exists && path.exists() {
        if let Err(e) = fs::remove_file(path) {
            info!(
                "Failed to delete file '{}' after the write permission check: {}",
                path.display(),
                e
            );
        }
    }

    writable
}

pub fn try_create_dir(path: &Path) -> bool {
    match fs::create_dir_all(path) {
        Ok(()) => true,
        Err(e) => {
            info!("Failed to create folder '{}': {}", path.display(), e);
            false
        }
    }
}

pub fn try_delete_dir(path: &Path, recursive: bool) -> bool {
    let result = if recursive {
        fs::remove_dir_all(path)
    } else {
        fs::remove_dir(path)
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            info!("Failed to delete folder '{}': {}", path.display(), e);
            false
        }
    }
}

/// Removes a file if it is still there. Missing files count as removed.
pub fn try_delete_file(path: &Path) -> bool {
    if !path.exists() {
        return true;
    }

    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Deleted temp file '{}'", path.display());
            true
        }
        Err(e) => {
            info!("Failed to delete file '{}': {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_url_detection() {
        assert!(is_http_url("http://example.com/guide.xml"));
        assert!(is_http_url("https://epg.example.co.uk/files/guide.xml.gz?token=a1"));
        assert!(is_http_url("http://127.0.0.1:8080/guide.xml"));
        assert!(!is_http_url("ftp://example.com/guide.xml"));
        assert!(!is_http_url("/var/lib/epg/guide.xml"));
        assert!(!is_http_url("C:\\epg\\guide.xml"));
    }

    #[test]
    fn test_archive_extensions() {
        assert!(is_gzip_path(Path::new("guide.xml.gz")));
        assert!(is_gzip_path(Path::new("guide.GZIP")));
        assert!(!is_gzip_path(Path::new("guide.xml")));
        assert!(is_unsupported_archive(Path::new("guide.zip")));
        assert!(is_unsupported_archive(Path::new("guide.tar")));
        assert!(!is_unsupported_archive(Path::new("guide.xml.gz")));
    }

    #[test]
    fn test_random_path_keeps_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = pick_random_file_path(dir.path(), Some(".gz"));
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(is_gzip_path(&path));
        assert!(!path.exists());
    }

    #[test]
    fn test_writable_probe_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.xml");
        assert!(is_file_writable(&path));
        assert!(!path.exists());
        assert!(!is_file_writable(&dir.path().join("missing").join("probe.xml")));
    }

    #[test]
    fn test_readable_and_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.txt");
        let full = dir.path().join("full.txt");
        fs::write(&empty, "").unwrap();
        fs::write(&full, "1\n").unwrap();
        assert!(!is_file_readable_and_not_empty(&empty));
        assert!(is_file_readable_and_not_empty(&full));
        assert!(!is_file_readable_and_not_empty(&dir.path().join("nope.txt")));
    }
}
