//! Shard directory layout constants and structural validation (spec §4.8
//! stage 1).

use std::collections::BTreeSet;
use std::path::Path;

use walkdir::WalkDir;

use crate::errors::AxmResult;
use crate::verify_error::{ErrorCode, VerifyFinding};

pub const REQUIRED_ROOT_ITEMS: &[&str] = &["manifest.json", "sig", "content", "graph", "evidence"];
pub const REQUIRED_SIG_FILES: &[&str] = &["manifest.sig", "publisher.pub"];
pub const REQUIRED_GRAPH_FILES: &[&str] = &["entities.parquet", "claims.parquet", "provenance.parquet"];
pub const REQUIRED_EVIDENCE_FILES: &[&str] = &["spans.parquet"];

/// Validate that `root` is exactly the required top-level layout with no
/// extra entries, no missing entries, no dotfiles, and no symlinks
/// anywhere in the tree, and that each subdirectory contains exactly its
/// required files (spec §4.8 stage 1). Returns `true` iff the layout is
/// structurally sound; on `false` the caller must stop (later stages
/// assume this holds).
pub fn validate_root_layout(root: &Path, errors: &mut Vec<VerifyFinding>) -> AxmResult<bool> {
    if !root.is_dir() {
        errors.push(VerifyFinding::new(
            ErrorCode::ELayoutMissing,
            "shard path does not exist or is not a directory",
        ));
        return Ok(false);
    }

    let required: BTreeSet<&str> = REQUIRED_ROOT_ITEMS.iter().copied().collect();
    let mut present: BTreeSet<String> = BTreeSet::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        present.insert(entry.file_name().to_string_lossy().into_owned());
    }

    let missing: Vec<&str> = required.iter().filter(|n| !present.contains(**n)).copied().collect();
    let extra: Vec<String> = present.iter().filter(|n| !required.contains(n.as_str())).cloned().collect();

    if !missing.is_empty() {
        errors.push(VerifyFinding::new(
            ErrorCode::ELayoutMissing,
            format!("missing required root items: {missing:?}"),
        ));
    }
    if !extra.is_empty() {
        errors.push(VerifyFinding::new(
            ErrorCode::ELayoutDirty,
            format!("unexpected root items present: {extra:?}"),
        ));
    }
    if !missing.is_empty() || !extra.is_empty() {
        return Ok(false);
    }

    if root.join("manifest.json").is_dir() {
        errors.push(VerifyFinding::new(ErrorCode::ELayoutType, "manifest.json must be a file"));
    }
    for dirname in ["sig", "content", "graph", "evidence"] {
        if !root.join(dirname).is_dir() {
            errors.push(VerifyFinding::new(ErrorCode::ELayoutType, format!("{dirname} must be a directory")));
        }
    }
    if !errors.is_empty() {
        return Ok(false);
    }

    check_exact_dir_contents(&root.join("sig"), REQUIRED_SIG_FILES, errors);
    check_exact_dir_contents(&root.join("graph"), REQUIRED_GRAPH_FILES, errors);
    check_exact_dir_contents(&root.join("evidence"), REQUIRED_EVIDENCE_FILES, errors);
    if !errors.is_empty() {
        return Ok(false);
    }

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if entry.file_type().is_symlink() {
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            errors.push(VerifyFinding::new(ErrorCode::ELayoutType, format!("symlink not permitted: {rel}")));
            return Ok(false);
        }
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            errors.push(VerifyFinding::new(ErrorCode::EDotfile, format!("dotfile found: {rel}")));
            return Ok(false);
        }
    }

    Ok(true)
}

/// Assert that `dir` contains exactly `required` entries (by file name),
/// no more and no fewer, pushing `E_LAYOUT_MISSING`/`E_LAYOUT_DIRTY`
/// findings for any deviation.
fn check_exact_dir_contents(dir: &Path, required: &[&str], errors: &mut Vec<VerifyFinding>) {
    let required_set: BTreeSet<&str> = required.iter().copied().collect();
    let present: BTreeSet<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => {
            errors.push(VerifyFinding::new(
                ErrorCode::ELayoutMissing,
                format!("{} is not readable", dir.display()),
            ));
            return;
        }
    };

    let missing: Vec<&str> = required_set.iter().filter(|n| !present.contains(**n)).copied().collect();
    let extra: Vec<String> = present.iter().filter(|n| !required_set.contains(n.as_str())).cloned().collect();

    if !missing.is_empty() {
        errors.push(VerifyFinding::new(
            ErrorCode::ELayoutMissing,
            format!("{} missing required items: {missing:?}", dir.display()),
        ));
    }
    if !extra.is_empty() {
        errors.push(VerifyFinding::new(
            ErrorCode::ELayoutDirty,
            format!("{} contains unexpected items: {extra:?}", dir.display()),
        ));
    }
}

/// Check that a 64-character lowercase hex string is well formed (a SHA-256
/// or Merkle root digest).
pub fn is_hex_64(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_valid_root(dir: &Path) {
        fs::write(dir.join("manifest.json"), b"{}").unwrap();
        fs::create_dir_all(dir.join("sig")).unwrap();
        fs::write(dir.join("sig/manifest.sig"), b"s").unwrap();
        fs::write(dir.join("sig/publisher.pub"), b"p").unwrap();
        fs::create_dir_all(dir.join("content")).unwrap();
        fs::create_dir_all(dir.join("graph")).unwrap();
        fs::write(dir.join("graph/entities.parquet"), b"e").unwrap();
        fs::write(dir.join("graph/claims.parquet"), b"c").unwrap();
        fs::write(dir.join("graph/provenance.parquet"), b"p").unwrap();
        fs::create_dir_all(dir.join("evidence")).unwrap();
        fs::write(dir.join("evidence/spans.parquet"), b"s").unwrap();
    }

    #[test]
    fn accepts_exact_layout() {
        let dir = tempfile::tempdir().unwrap();
        make_valid_root(dir.path());
        let mut errors = Vec::new();
        assert!(validate_root_layout(dir.path(), &mut errors).unwrap());
        assert!(errors.is_empty());
    }

    #[test]
    fn rejects_missing_item() {
        let dir = tempfile::tempdir().unwrap();
        make_valid_root(dir.path());
        fs::remove_dir_all(dir.path().join("evidence")).unwrap();
        let mut errors = Vec::new();
        assert!(!validate_root_layout(dir.path(), &mut errors).unwrap());
        assert_eq!(errors[0].code, ErrorCode::ELayoutMissing);
    }

    #[test]
    fn rejects_extra_item() {
        let dir = tempfile::tempdir().unwrap();
        make_valid_root(dir.path());
        fs::write(dir.path().join("extra.txt"), b"x").unwrap();
        let mut errors = Vec::new();
        assert!(!validate_root_layout(dir.path(), &mut errors).unwrap());
        assert!(errors.iter().any(|e| e.code == ErrorCode::ELayoutDirty));
    }

    #[test]
    fn rejects_dotfile() {
        let dir = tempfile::tempdir().unwrap();
        make_valid_root(dir.path());
        fs::write(dir.path().join("content/.hidden"), b"x").unwrap();
        let mut errors = Vec::new();
        assert!(!validate_root_layout(dir.path(), &mut errors).unwrap());
        assert_eq!(errors[0].code, ErrorCode::EDotfile);
    }

    #[test]
    fn hex64_validation() {
        assert!(is_hex_64(&"a".repeat(64)));
        assert!(!is_hex_64(&"a".repeat(63)));
        assert!(!is_hex_64(&"g".repeat(64)));
    }
}
