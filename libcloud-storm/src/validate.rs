use std::net::IpAddr;

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Cheap syntactic check run before a candidate costs a network round-trip.
///
/// The whole string counts, so path suffixes such as `host/bucket` end up in
/// the last label.
pub fn is_valid_candidate(name: &str) -> bool {
    if name.len() > MAX_NAME_LEN {
        return false;
    }
    name.split('.')
        .all(|label| (1..=MAX_LABEL_LEN).contains(&label.len()))
}

pub fn is_valid_ip(addr: &str) -> bool {
    addr.parse::<IpAddr>().is_ok()
}

pub(crate) fn valid_candidates(targets: &[String]) -> Vec<String> {
    targets
        .iter()
        .filter(|t| is_valid_candidate(t))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_regular_hostnames() {
        assert!(is_valid_candidate("acme.s3.amazonaws.com"));
        assert!(is_valid_candidate("storage.googleapis.com/acme-backup"));
        assert!(is_valid_candidate("a"));
    }

    #[test]
    fn rejects_empty_labels() {
        assert!(!is_valid_candidate(""));
        assert!(!is_valid_candidate("acme..com"));
        assert!(!is_valid_candidate(".acme.com"));
        assert!(!is_valid_candidate("acme.com."));
    }

    #[test]
    fn label_length_boundary() {
        let ok = format!("{}.com", "a".repeat(63));
        let too_long = format!("{}.com", "a".repeat(64));
        assert!(is_valid_candidate(&ok));
        assert!(!is_valid_candidate(&too_long));
    }

    #[test]
    fn total_length_boundary() {
        // 4 labels of 62 chars + 3 dots = 251, plus ".a" = 253
        let label = "b".repeat(62);
        let ok = format!("{label}.{label}.{label}.{label}.a");
        assert_eq!(ok.len(), 253);
        assert!(is_valid_candidate(&ok));

        let too_long = format!("{ok}b");
        assert!(!is_valid_candidate(&too_long));
    }

    #[test]
    fn filters_invalid_entries() {
        let targets = vec![
            "good.example.com".to_string(),
            "bad..example.com".to_string(),
            format!("{}.example.com", "x".repeat(70)),
            "also-good.example.com".to_string(),
        ];
        assert_eq!(
            valid_candidates(&targets),
            vec!["good.example.com", "also-good.example.com"]
        );
    }

    #[test]
    fn ip_addresses() {
        assert!(is_valid_ip("1.1.1.1"));
        assert!(is_valid_ip("2606:4700:4700::1111"));
        assert!(!is_valid_ip("dns.google"));
        assert!(!is_valid_ip("300.1.1.1"));
    }
}
