use super::{with_suffix, Stopwatch};
use crate::{
    dns::Lookup,
    http::Transport,
    names::clean_wordlist,
    report::{settle, FindingSink, Verdict},
    scanner::{ScanError, Scanner},
    types::{Access, Finding, ProbeResult, Provider, Redirects, Scheme},
};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

pub const BLOB_URL: &str = "blob.core.windows.net";
pub const FILE_URL: &str = "file.core.windows.net";
pub const QUEUE_URL: &str = "queue.core.windows.net";
pub const TABLE_URL: &str = "table.core.windows.net";
pub const MGMT_URL: &str = "scm.azurewebsites.net";
pub const VAULT_URL: &str = "vault.azure.net";
pub const WEBAPP_URL: &str = "azurewebsites.net";
pub const DATABASE_URL: &str = "database.windows.net";
pub const VM_URL: &str = "cloudapp.azure.com";

const AUTH_FAILED: &str = "Server failed to authenticate the request";
const ACCOUNT_DISABLED: &str = "The specified account is disabled";

const AUTH_REQUIRED: &[&str] = &[
    "not authorized to perform this operation",
    "not have sufficient permissions",
    "Public access is not permitted",
    AUTH_FAILED,
];

fn hit(msg: &str, result: &ProbeResult, access: Access) -> Verdict {
    Verdict::Hit(Finding::new(Provider::Azure, msg, &result.url, access))
}

/// Storage-style account responses, shared by every account type.
pub fn classify_account(result: &ProbeResult) -> Verdict {
    if result.status == 404 || result.reason.contains("The requested URI does not represent") {
        Verdict::Miss
    } else if result.mentions(AUTH_FAILED) {
        hit("Auth-Only Account", result, Access::Protected)
    } else if result.mentions(ACCOUNT_DISABLED) {
        hit("Disabled Account", result, Access::Disabled)
    } else if result.mentions("Value for one of the query") {
        hit("HTTP-OK Account", result, Access::Public)
    } else if result.mentions("The account being accessed") {
        hit("HTTPS-Only Account", result, Access::Public)
    } else if result.mentions("Unauthorized") {
        hit("Unauthorized Account", result, Access::Public)
    } else {
        Verdict::Unrecognized
    }
}

/// Container listing responses. Account-wide conditions end the batch: no
/// container in a disabled or locked account will answer differently.
pub fn classify_container(result: &ProbeResult) -> Verdict {
    if result.mentions(ACCOUNT_DISABLED) {
        return Verdict::Breakout("account disabled");
    }
    if AUTH_REQUIRED.iter().any(|needle| result.mentions(needle)) {
        return Verdict::Breakout("auth required");
    }
    if result.mentions("Blob API is not yet supported") {
        return Verdict::Breakout("hierarchical namespace account");
    }

    match result.status {
        404 => Verdict::Miss,
        200 => hit("OPEN AZURE CONTAINER", result, Access::Public),
        _ if result.mentions("One of the request inputs is out of range")
            || result.mentions("The request URI is invalid") =>
        {
            Verdict::Miss
        }
        _ => Verdict::Unrecognized,
    }
}

/// Resolve `{name}.{domain}` for alphanumeric names, probe the ones that
/// exist and return them.
pub async fn check_account_type<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    names: &[String],
    sink: &dyn FindingSink,
    domain: &str,
    label: &str,
) -> Result<Vec<String>, ScanError> {
    info!("Checking for Azure {}", label);
    let timer = Stopwatch::start();

    let candidates: Vec<String> = names
        .iter()
        .filter(|n| n.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|n| format!("{n}.{domain}"))
        .collect();

    let accounts = scanner.resolve_sorted(&candidates).await?;
    scanner
        .probe(&accounts, Scheme::Http, Redirects::Follow, |result| {
            settle(classify_account(result), result, sink)
        })
        .await;

    timer.stop();
    Ok(accounts)
}

/// Accounts worth brute-forcing: reachable and neither auth-only nor disabled.
async fn brute_candidates<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    accounts: &[String],
) -> Vec<String> {
    info!(
        "Checking {} accounts for status before brute-forcing",
        accounts.len()
    );

    let checks = stream::iter(accounts.iter().cloned())
        .map(|account| async move {
            let url = format!("https://{account}/");
            match scanner.transport().fetch(&url, Redirects::Follow).await {
                Ok(result)
                    if result.reason.contains(AUTH_FAILED)
                        || result.reason.contains(ACCOUNT_DISABLED) =>
                {
                    None
                }
                Ok(_) => Some(account),
                Err(e) => {
                    warn!("Connection error on {}: {}", url, e);
                    None
                }
            }
        })
        .buffered(scanner.config().threads.max(1));

    checks.filter_map(|a| async move { a }).collect().await
}

pub async fn brute_force_containers<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    accounts: &[String],
    sink: &dyn FindingSink,
) {
    let valid = brute_candidates(scanner, accounts).await;
    let words = clean_wordlist(&scanner.config().brute_list, 3, 63);
    let timer = Stopwatch::start();

    info!(
        "Brute-forcing container names in {} storage accounts",
        valid.len()
    );
    for account in &valid {
        info!(
            "Brute-forcing {} container names in {}",
            words.len(),
            account
        );
        let candidates: Vec<String> = words
            .iter()
            .map(|w| format!("{account}/{w}/?restype=container&comp=list"))
            .collect();

        let mut open = Vec::new();
        scanner
            .probe(&candidates, Scheme::Https, Redirects::Follow, |result| {
                let verdict = classify_container(result);
                if matches!(verdict, Verdict::Hit(_)) {
                    open.push(result.url.clone());
                }
                settle(verdict, result, sink)
            })
            .await;
        scanner.list_buckets(&open, sink).await;
    }

    timer.stop();
}

/// DNS-only check: every resolved name is a finding.
async fn check_dns_names<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    candidates: &[String],
    sink: &dyn FindingSink,
    msg: &str,
) -> Result<(), ScanError> {
    scanner
        .resolve(candidates, |hostname| {
            sink.report(&Finding::new(Provider::Azure, msg, hostname, Access::Public));
        })
        .await?;
    Ok(())
}

pub async fn check_websites<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    names: &[String],
    sink: &dyn FindingSink,
) -> Result<(), ScanError> {
    info!("Checking for Azure Websites");
    let timer = Stopwatch::start();
    let candidates = with_suffix(names, WEBAPP_URL);
    check_dns_names(scanner, &candidates, sink, "Registered Azure Website DNS Name").await?;
    timer.stop();
    Ok(())
}

pub async fn check_databases<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    names: &[String],
    sink: &dyn FindingSink,
) -> Result<(), ScanError> {
    info!("Checking for Azure Databases");
    let timer = Stopwatch::start();
    let candidates = with_suffix(names, DATABASE_URL);
    check_dns_names(scanner, &candidates, sink, "Registered Azure Database DNS Name").await?;
    timer.stop();
    Ok(())
}

pub async fn check_vms<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    names: &[String],
    sink: &dyn FindingSink,
) -> Result<(), ScanError> {
    info!("Checking for Azure Virtual Machines");
    let timer = Stopwatch::start();

    let regions = &scanner.config().azure_regions;
    info!("Testing across {} regions defined in the config file", regions.len());
    for region in regions {
        let candidates = with_suffix(names, &format!("{region}.{VM_URL}"));
        check_dns_names(
            scanner,
            &candidates,
            sink,
            "Registered Azure Virtual Machine DNS Name",
        )
        .await?;
    }

    timer.stop();
    Ok(())
}

pub async fn run_all<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    names: &[String],
    sink: &dyn FindingSink,
) -> Result<(), ScanError> {
    info!("++++++++ azure checks ++++++++");

    let storage = check_account_type(scanner, names, sink, BLOB_URL, "Storage Accounts").await?;
    if !storage.is_empty() && !scanner.config().quick_scan {
        brute_force_containers(scanner, &storage, sink).await;
    }

    for (domain, label) in [
        (FILE_URL, "File Accounts"),
        (QUEUE_URL, "Queue Accounts"),
        (TABLE_URL, "Table Accounts"),
        (MGMT_URL, "App Management Accounts"),
        (VAULT_URL, "Key Vault Accounts"),
    ] {
        check_account_type(scanner, names, sink, domain, label).await?;
    }

    check_websites(scanner, names, sink).await?;
    check_databases(scanner, names, sink).await?;
    check_vms(scanner, names, sink).await
}
