use sha2::{Digest, Sha256};

/// Normalizes chunk content and returns its SHA-256 hex digest.
///
/// Normalization: trim trailing whitespace on each line, normalize line
/// endings to LF, preserve interior whitespace. Pure and deterministic —
/// this is the sole basis of change detection across runs.
pub fn content_hash(content: &str) -> String {
    let normalized = normalize(content);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn normalize(content: &str) -> String {
    content
        .replace("\r\n", "\n")
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        let a = content_hash("fn main() {}\n");
        let b = content_hash("fn main() {}\n");
        assert_eq!(a, b);
    }

    #[test]
    fn crlf_and_lf_are_equivalent() {
        let lf = content_hash("a\nb\nc\n");
        let crlf = content_hash("a\r\nb\r\nc\r\n");
        assert_eq!(lf, crlf);
    }

    #[test]
    fn trailing_whitespace_is_ignored() {
        let a = content_hash("a  \nb\n");
        let b = content_hash("a\nb\n");
        assert_eq!(a, b);
    }

    #[test]
    fn interior_whitespace_preserved() {
        let a = content_hash("a  b\n");
        let b = content_hash("a b\n");
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_lowercase_hex() {
        let h = content_hash("x");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }
}
