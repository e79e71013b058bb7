use std::path::{Path, PathBuf};

#[allow(dead_code)]
pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[allow(dead_code)]
pub fn fixture(relative: &str) -> String {
    let path = fixtures_dir().join(relative);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {path:?}: {e}"))
}

#[allow(dead_code)]
pub fn collect_xml_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(read_dir) = std::fs::read_dir(dir) {
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "xml") {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

/// Every fixture document, keyed by path relative to the fixtures directory.
#[allow(dead_code)]
pub fn all_documents() -> Vec<(String, String)> {
    ["ubl", "cii"]
        .into_iter()
        .flat_map(|dir| collect_xml_files(&fixtures_dir().join(dir)))
        .map(|path| {
            let name = path
                .strip_prefix(fixtures_dir())
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            let xml = std::fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("failed to read {path:?}: {e}"));
            (name, xml)
        })
        .collect()
}
