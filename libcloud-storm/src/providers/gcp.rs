use super::Stopwatch;
use crate::{
    dns::Lookup,
    http::Transport,
    names::clean_wordlist,
    report::{settle, FindingSink, Verdict},
    types::{Access, Finding, ProbeResult, Provider, Redirects, Scheme},
    scanner::Scanner,
};
use tracing::info;

const GCP_URL: &str = "storage.googleapis.com";
const FBRTDB_URL: &str = "firebaseio.com";
const APPSPOT_URL: &str = "appspot.com";
const FUNC_URL: &str = "cloudfunctions.net";
const FBAPP_URL: &str = "firebaseapp.com";

const GOOGLE_LOGIN: &str = "accounts.google.com";

fn hit(msg: &str, target: &str, access: Access) -> Verdict {
    Verdict::Hit(Finding::new(Provider::Gcp, msg, target, access))
}

pub fn classify_bucket(result: &ProbeResult) -> Verdict {
    match result.status {
        404 => Verdict::Miss,
        200 => hit("OPEN GOOGLE BUCKET", &result.url, Access::Public),
        403 => hit("Protected Google Bucket", &result.url, Access::Protected),
        _ => Verdict::Unrecognized,
    }
}

pub fn classify_firebase_rtdb(result: &ProbeResult) -> Verdict {
    match result.status {
        404 => Verdict::Miss,
        200 => hit("OPEN GOOGLE FIREBASE RTDB", &result.url, Access::Public),
        401 => hit("Protected Google Firebase RTDB", &result.url, Access::Protected),
        402 => hit(
            "Payment required on Google Firebase RTDB",
            &result.url,
            Access::Disabled,
        ),
        423 => hit(
            "The Firebase database has been deactivated.",
            &result.url,
            Access::Disabled,
        ),
        _ => Verdict::Unrecognized,
    }
}

pub fn classify_firebase_app(result: &ProbeResult) -> Verdict {
    match result.status {
        404 => Verdict::Miss,
        200 => hit("OPEN GOOGLE FIREBASE APP", &result.url, Access::Public),
        _ => Verdict::Unrecognized,
    }
}

pub fn classify_appspot(result: &ProbeResult) -> Verdict {
    match result.status {
        404 => Verdict::Miss,
        500..=599 => hit(
            "Google App Engine app with a 50x error",
            &result.url,
            Access::Public,
        ),
        200 | 302 if result.url.contains(GOOGLE_LOGIN) => hit(
            "Protected Google App Engine app",
            &result.original_url,
            Access::Protected,
        ),
        200 | 302 => hit("Open Google App Engine app", &result.url, Access::Public),
        _ => Verdict::Unrecognized,
    }
}

/// First pass over `{region}-{project}`: a redirect means the project has
/// at least one function deployed in that region.
pub fn classify_function_project(result: &ProbeResult) -> Verdict {
    match result.status {
        404 => Verdict::Miss,
        302 => hit("Contains at least 1 Cloud Function", &result.url, Access::Public),
        _ => Verdict::Unrecognized,
    }
}

pub fn classify_function(result: &ProbeResult) -> Verdict {
    if result.url.contains("accounts.google.com/ServiceLogin") {
        return Verdict::Miss;
    }
    match result.status {
        401 | 403 => hit("Auth required Cloud Function", &result.url, Access::Protected),
        405 => hit(
            "UNAUTHENTICATED Cloud Function (POST-Only)",
            &result.url,
            Access::Public,
        ),
        200 | 404 => hit(
            "UNAUTHENTICATED Cloud Function (GET-OK)",
            &result.url,
            Access::Public,
        ),
        _ => Verdict::Unrecognized,
    }
}

fn without_dots(names: &[String], suffix: &str) -> Vec<String> {
    names
        .iter()
        .filter(|n| !n.contains('.'))
        .map(|n| format!("{n}.{suffix}"))
        .collect()
}

pub async fn check_buckets<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    names: &[String],
    sink: &dyn FindingSink,
) {
    info!("Checking for Google buckets");
    let timer = Stopwatch::start();

    let candidates: Vec<String> = names.iter().map(|n| format!("{GCP_URL}/{n}")).collect();
    let mut open = Vec::new();
    scanner
        .probe(&candidates, Scheme::Http, Redirects::Follow, |result| {
            let verdict = classify_bucket(result);
            if matches!(&verdict, Verdict::Hit(f) if f.access.is_public()) {
                open.push(format!("{}/", result.url.trim_end_matches('/')));
            }
            settle(verdict, result, sink)
        })
        .await;
    scanner.list_buckets(&open, sink).await;

    timer.stop();
}

pub async fn check_firebase_rtdb<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    names: &[String],
    sink: &dyn FindingSink,
) {
    info!("Checking for Google Firebase Realtime Databases");
    let timer = Stopwatch::start();

    let candidates: Vec<String> = without_dots(names, FBRTDB_URL)
        .into_iter()
        .map(|host| format!("{host}/.json"))
        .collect();
    scanner
        .probe(&candidates, Scheme::Https, Redirects::Stop, |result| {
            settle(classify_firebase_rtdb(result), result, sink)
        })
        .await;

    timer.stop();
}

pub async fn check_firebase_apps<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    names: &[String],
    sink: &dyn FindingSink,
) {
    info!("Checking for Google Firebase Applications");
    let timer = Stopwatch::start();

    let candidates = without_dots(names, FBAPP_URL);
    scanner
        .probe(&candidates, Scheme::Https, Redirects::Stop, |result| {
            settle(classify_firebase_app(result), result, sink)
        })
        .await;

    timer.stop();
}

pub async fn check_appspot<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    names: &[String],
    sink: &dyn FindingSink,
) {
    info!("Checking for Google App Engine apps");
    let timer = Stopwatch::start();

    let candidates = without_dots(names, APPSPOT_URL);
    scanner
        .probe(&candidates, Scheme::Http, Redirects::Follow, |result| {
            settle(classify_appspot(result), result, sink)
        })
        .await;

    timer.stop();
}

/// `http://host/` -> `host/`, the form the prober expects.
fn function_base(url: &str) -> String {
    let host = url
        .trim_start_matches("http://")
        .trim_start_matches("https://");
    format!("{}/", host.trim_end_matches('/'))
}

pub async fn check_functions<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    names: &[String],
    sink: &dyn FindingSink,
) {
    info!("Checking for project/zones with Google Cloud Functions.");
    let timer = Stopwatch::start();

    let regions = &scanner.config().gcp_regions;
    info!("Testing across {} regions defined in the config file", regions.len());

    let candidates: Vec<String> = regions
        .iter()
        .flat_map(|region| names.iter().map(move |n| format!("{region}-{n}.{FUNC_URL}")))
        .collect();

    scanner.governor().reset();
    let mut projects = Vec::new();
    scanner
        .probe(&candidates, Scheme::Http, Redirects::Stop, |result| {
            let verdict = classify_function_project(result);
            if matches!(verdict, Verdict::Hit(_)) {
                projects.push(result.url.clone());
            }
            settle(verdict, result, sink)
        })
        .await;

    if projects.is_empty() || scanner.config().quick_scan {
        timer.stop();
        return;
    }

    info!(
        "Brute-forcing function names in {} project/region combos",
        projects.len()
    );
    let words = clean_wordlist(&scanner.config().brute_list, 1, 63);
    for project in &projects {
        info!("Brute-forcing {} function names in {}", words.len(), project);
        let base = function_base(project);
        let candidates: Vec<String> = words.iter().map(|w| format!("{base}{w}/")).collect();
        scanner
            .probe(&candidates, Scheme::Http, Redirects::Follow, |result| {
                settle(classify_function(result), result, sink)
            })
            .await;
    }

    timer.stop();
}

pub async fn run_all<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    names: &[String],
    sink: &dyn FindingSink,
) {
    info!("++++++++ google checks ++++++++");
    check_buckets(scanner, names, sink).await;
    check_firebase_rtdb(scanner, names, sink).await;
    if scanner.config().firebase_apps {
        check_firebase_apps(scanner, names, sink).await;
    }
    check_appspot(scanner, names, sink).await;
    check_functions(scanner, names, sink).await;
}
