use super::{with_suffix, Stopwatch};
use crate::{
    dns::Lookup,
    http::Transport,
    report::{settle, FindingSink, Verdict},
    scanner::{ScanError, Scanner},
    types::{Access, Finding, ProbeResult, Provider, Redirects, Scheme},
};
use tracing::info;

const S3_URL: &str = "s3.amazonaws.com";
const APPS_URL: &str = "awsapps.com";

pub fn classify_s3(result: &ProbeResult) -> Verdict {
    if result.status == 404 || result.reason.contains("Bad Request") {
        return Verdict::Miss;
    }
    match result.status {
        200 => Verdict::Hit(Finding::new(
            Provider::Aws,
            "OPEN S3 BUCKET",
            &result.url,
            Access::Public,
        )),
        403 => Verdict::Hit(Finding::new(
            Provider::Aws,
            "Protected S3 Bucket",
            &result.url,
            Access::Protected,
        )),
        _ if result.reason.contains("Slow Down") => {
            Verdict::Breakout("you've been rate limited, skipping rest of check")
        }
        _ => Verdict::Unrecognized,
    }
}

pub async fn check_s3_buckets<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    names: &[String],
    sink: &dyn FindingSink,
) {
    info!("Checking for S3 buckets");
    let timer = Stopwatch::start();

    let candidates = with_suffix(names, S3_URL);
    let mut open = Vec::new();
    scanner
        .probe(&candidates, Scheme::Http, Redirects::Follow, |result| {
            let verdict = classify_s3(result);
            if matches!(&verdict, Verdict::Hit(f) if f.access.is_public()) {
                open.push(result.url.clone());
            }
            settle(verdict, result, sink)
        })
        .await;
    scanner.list_buckets(&open, sink).await;

    timer.stop();
}

/// WorkDocs, WorkMail, Connect and friends only show up in DNS.
pub async fn check_aws_apps<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    names: &[String],
    sink: &dyn FindingSink,
) -> Result<(), ScanError> {
    info!("Checking for AWS Apps");
    let timer = Stopwatch::start();

    let candidates = with_suffix(names, APPS_URL);
    for name in scanner.resolve_sorted(&candidates).await? {
        sink.report(&Finding::new(
            Provider::Aws,
            "AWS App Found:",
            format!("https://{name}"),
            Access::Protected,
        ));
    }

    timer.stop();
    Ok(())
}

pub async fn run_all<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    names: &[String],
    sink: &dyn FindingSink,
) -> Result<(), ScanError> {
    info!("++++++++ amazon checks ++++++++");
    check_s3_buckets(scanner, names, sink).await;
    check_aws_apps(scanner, names, sink).await
}
