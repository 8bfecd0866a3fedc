use super::snapshot::BlockSnapshot;
use fancy_regex::Regex;
use sentinel_dns_domain::DomainError;
use std::fs;
use tracing::warn;

/// Parse one blocklist source file into `snapshot`. Lines are either:
/// - blank or `#`-prefixed: ignored
/// - `/pattern/`: slash-delimited regex, compiled and pushed into `deny_patterns`
/// - anything else: lowercased and inserted into the exact set (a leading
///   `*.` is a suffix-label wildcard, stripped before insertion)
fn load_deny_source(path: &str, snapshot: &mut BlockSnapshot) -> Result<(), DomainError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| DomainError::ConfigMissing(format!("blocklist source {path}: {e}")))?;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(pattern) = slash_delimited_pattern(line) {
            match Regex::new(pattern) {
                Ok(re) => snapshot.deny_patterns.push(re),
                Err(e) => warn!(%path, pattern, error = %e, "skipping invalid blocklist regex"),
            }
            continue;
        }
        let domain = line.trim_start_matches("*.").to_ascii_lowercase();
        if snapshot.deny_exact.insert(domain) {
            snapshot.domain_count += 1;
        }
    }
    Ok(())
}

/// `/pattern/` is a regex rule; the pattern itself may not contain an
/// unescaped `/`. A bare leading/trailing slash with nothing between (`//`)
/// is not a rule, since that's what an empty-pattern typo would look like.
fn slash_delimited_pattern(line: &str) -> Option<&str> {
    let inner = line.strip_prefix('/')?.strip_suffix('/')?;
    if inner.is_empty() {
        return None;
    }
    Some(inner)
}

fn load_allow_source(path: &str, snapshot: &mut BlockSnapshot) -> Result<(), DomainError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| DomainError::ConfigMissing(format!("allowlist source {path}: {e}")))?;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        snapshot.allow_exact.insert(line.to_ascii_lowercase());
    }
    Ok(())
}

/// Compile a fresh `BlockSnapshot` from configured file sources. Performs
/// blocking file I/O; callers on an async runtime should run this via
/// `spawn_blocking`.
pub fn compile_snapshot(deny_sources: &[String], allow_sources: &[String]) -> Result<BlockSnapshot, DomainError> {
    let mut snapshot = BlockSnapshot::empty();
    for path in deny_sources {
        load_deny_source(path, &mut snapshot)?;
    }
    for path in allow_sources {
        load_allow_source(path, &mut snapshot)?;
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_exact_wildcard_and_regex_lines() {
        let mut file = tempfile_with(
            "# comment\nads.example.com\n*.tracker.net\n/^evil-[0-9]+\\.com$/\n",
        );
        let mut snapshot = BlockSnapshot::empty();
        load_deny_source(file.path_str(), &mut snapshot).unwrap();
        assert!(snapshot.deny_exact.contains("ads.example.com"));
        assert!(snapshot.deny_exact.contains("tracker.net"));
        assert_eq!(snapshot.deny_patterns.len(), 1);
        assert_eq!(snapshot.domain_count, 2);
        file.cleanup();
    }

    struct TempFile {
        path: std::path::PathBuf,
    }

    impl TempFile {
        fn path_str(&self) -> &str {
            self.path.to_str().unwrap()
        }

        fn cleanup(&mut self) {
            let _ = fs::remove_file(&self.path);
        }
    }

    fn tempfile_with(contents: &str) -> TempFile {
        let mut path = std::env::temp_dir();
        path.push(format!("sentinel-dns-test-{}.txt", fastrand::u64(..)));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        TempFile { path }
    }
}
