use crate::http::{Transport, TransportError};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref KEY_RE: Regex = Regex::new(r"<(?:Key|Name)>(.*?)</(?:Key|Name)>").expect("static regex");
}

/// Bucket URL without its query string.
pub fn bucket_base(bucket: &str) -> &str {
    bucket.split_once('?').map_or(bucket, |(base, _)| base)
}

/// Full object URLs for every `<Key>`/`<Name>` in a listing document.
pub fn extract_bucket_files(bucket: &str, listing: &str) -> Vec<String> {
    let base = bucket_base(bucket);
    KEY_RE
        .captures_iter(listing)
        .map(|caps| format!("{}{}", base, &caps[1]))
        .collect()
}

/// Fetch an open bucket and list the objects it exposes.
pub async fn list_bucket<T: Transport>(
    transport: &T,
    bucket: &str,
) -> Result<Vec<String>, TransportError> {
    let listing = transport.fetch_text(bucket).await?;
    Ok(extract_bucket_files(bucket, &listing))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_s3_keys() {
        let xml = r#"<?xml version="1.0"?><ListBucketResult><Name>acme</Name>
            <Contents><Key>file1</Key></Contents><Contents><Key>dir/file2.txt</Key></Contents>
            </ListBucketResult>"#;
        assert_eq!(
            extract_bucket_files("http://acme.s3.amazonaws.com/", xml),
            vec![
                "http://acme.s3.amazonaws.com/acme",
                "http://acme.s3.amazonaws.com/file1",
                "http://acme.s3.amazonaws.com/dir/file2.txt",
            ]
        );
    }

    #[test]
    fn strips_query_from_container_urls() {
        let xml = "<EnumerationResults><Blobs><Blob><Name>a.txt</Name></Blob></Blobs></EnumerationResults>";
        assert_eq!(
            extract_bucket_files(
                "https://acct.blob.core.windows.net/logs/?restype=container&comp=list",
                xml
            ),
            vec!["https://acct.blob.core.windows.net/logs/a.txt"]
        );
    }

    #[test]
    fn empty_listing() {
        assert!(extract_bucket_files("http://x/", "<ListBucketResult/>").is_empty());
    }
}
