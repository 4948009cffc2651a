//! Key families of the branch-partitioned keyspace
//!
//! Every record is keyed by branch first, so all scans are naturally
//! scoped. Values under index families are empty; the node/edge ID is the
//! last `/`-separated segment of the key.

/// Node payloads: `N/<branch>/<id>`
pub const NODE: &str = "N";
/// Edge payloads: `E/<branch>/<id>`
pub const EDGE: &str = "E";
/// Index by file: `IF/<branch>/<filepath>/<nodeId>`
pub const IDX_FILE: &str = "IF";
/// Index by type: `IT/<branch>/<type>/<nodeId>`
pub const IDX_TYPE: &str = "IT";
/// Index by package: `IP/<branch>/<pkg>/<nodeId>`
pub const IDX_PACKAGE: &str = "IP";
/// Index by lowercased name: `IN/<branch>/<nameLower>/<nodeId>`
pub const IDX_NAME: &str = "IN";
/// Outgoing edges: `EO/<branch>/<sourceId>/<edgeId>`
pub const EDGES_OUT: &str = "EO";
/// Incoming edges: `EI/<branch>/<targetId>/<edgeId>`
pub const EDGES_IN: &str = "EI";
/// Branch metadata: `M/<branch>`
pub const META: &str = "M";

const FAMILIES: &[&str] = &[
    NODE, EDGE, IDX_FILE, IDX_TYPE, IDX_PACKAGE, IDX_NAME, EDGES_OUT, EDGES_IN, META,
];

pub fn record_key(family: &str, branch: &str, id: &str) -> Vec<u8> {
    format!("{family}/{branch}/{id}").into_bytes()
}

pub fn record_prefix(family: &str, branch: &str) -> Vec<u8> {
    format!("{family}/{branch}/").into_bytes()
}

/// `IF/<branch>/<filepath>/<nodeId>` and friends.
pub fn index_key(family: &str, branch: &str, attr: &str, id: &str) -> Vec<u8> {
    format!("{family}/{branch}/{attr}/{id}").into_bytes()
}

pub fn index_prefix(family: &str, branch: &str, attr: &str) -> Vec<u8> {
    format!("{family}/{branch}/{attr}/").into_bytes()
}

pub fn meta_key(branch: &str) -> Vec<u8> {
    format!("{META}/{branch}").into_bytes()
}

/// Every scan prefix that holds records of one branch. The metadata key
/// is exact (no trailing `/`) and must be handled separately — a prefix
/// scan of `M/main` would also match `M/main2`.
pub fn branch_prefixes(branch: &str) -> Vec<Vec<u8>> {
    FAMILIES
        .iter()
        .filter(|f| **f != META)
        .map(|family| record_prefix(family, branch))
        .collect()
}

/// The trailing segment of a key — the node/edge ID for index families.
/// Attribute segments may themselves contain `/` (file paths), which is
/// why parsing is always from the right.
pub fn last_segment(key: &[u8]) -> Option<&str> {
    let pos = key.iter().rposition(|b| *b == b'/')?;
    std::str::from_utf8(&key[pos + 1..]).ok()
}

/// Rewrite the branch segment of a key, keeping family and remainder.
/// Returns `None` for keys that do not belong to `old_branch`.
pub fn rebranch(key: &[u8], old_branch: &str, new_branch: &str) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(key).ok()?;
    let (family, rest) = text.split_once('/')?;
    if rest == old_branch {
        // Metadata key has no trailing segment
        return Some(format!("{family}/{new_branch}").into_bytes());
    }
    let remainder = rest.strip_prefix(old_branch)?.strip_prefix('/')?;
    Some(format!("{family}/{new_branch}/{remainder}").into_bytes())
}

/// Branch names become key segments, so they must be non-empty and
/// `/`-free. `~` is reserved for internal scratch branches.
pub fn validate_branch(branch: &str) -> Result<(), String> {
    if branch.is_empty() {
        return Err("branch name must not be empty".to_string());
    }
    if branch.contains('/') {
        return Err(format!("branch name {branch:?} must not contain '/'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_segment_handles_slashes_in_attr() {
        let key = index_key(IDX_FILE, "main", "src/a.go", "deadbeef");
        assert_eq!(last_segment(&key), Some("deadbeef"));
    }

    #[test]
    fn test_rebranch() {
        let key = record_key(NODE, "main", "abc");
        assert_eq!(
            rebranch(&key, "main", "feat"),
            Some(b"N/feat/abc".to_vec())
        );
        assert_eq!(rebranch(&key, "other", "feat"), None);
        assert_eq!(
            rebranch(&meta_key("main"), "main", "feat"),
            Some(b"M/feat".to_vec())
        );
    }

    #[test]
    fn test_validate_branch() {
        assert!(validate_branch("main").is_ok());
        assert!(validate_branch("").is_err());
        assert!(validate_branch("feat/x").is_err());
    }
}
