mod common;

use common::{strings, MockLookup};
use libcloud_storm::{
    dns_workers, resolve_one, DnsBatchResolver, DnsError, HickoryLookup, Lookup, LookupError,
    Resolution,
};
use std::{collections::HashSet, net::SocketAddr, sync::Arc};
use tokio::net::UdpSocket;

fn resolver(lookup: MockLookup) -> (Arc<MockLookup>, DnsBatchResolver<MockLookup>) {
    let lookup = Arc::new(lookup);
    (Arc::clone(&lookup), DnsBatchResolver::new(lookup))
}

#[tokio::test]
async fn resolves_existing_names_and_calls_back_once_each() {
    let (_, dns) = resolver(MockLookup::new(["foo.example.com"]));
    let names: Vec<String> = ["foo", "bar"]
        .iter()
        .map(|n| format!("{n}.example.com"))
        .collect();

    let mut callbacks = Vec::new();
    let found = dns
        .resolve_batch(&names, 25, |name| callbacks.push(name.to_string()))
        .await
        .unwrap();

    assert_eq!(found, HashSet::from(["foo.example.com".to_string()]));
    assert_eq!(callbacks, vec!["foo.example.com"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repeated_batches_agree() {
    let names: Vec<String> = (0..300).map(|i| format!("acct{i}.example.net")).collect();
    let existing: Vec<String> = names.iter().step_by(7).cloned().collect();
    let (_, dns) = resolver(MockLookup::new(existing.clone()));

    let first = dns.resolve_batch(&names, 5, |_| {}).await.unwrap();
    let second = dns.resolve_batch(&names, 5, |_| {}).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first, existing.into_iter().collect::<HashSet<_>>());
}

#[tokio::test]
async fn invalid_names_are_never_looked_up() {
    let (lookup, dns) = resolver(MockLookup::new(["ok.example.com"]));
    let names = strings(&["ok.example.com", "bad..example.com", ""]);

    let found = dns.resolve_batch(&names, 1, |_| {}).await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(lookup.calls(), 1);
    assert_eq!(lookup.attempts("bad..example.com"), 0);
}

#[tokio::test]
async fn single_timeout_is_retried() {
    let lookup = MockLookup::new(["slow.example.com"]).timing_out("slow.example.com", 1);
    assert_eq!(
        resolve_one(&lookup, "slow.example.com").await,
        Resolution::Found("slow.example.com".to_string())
    );
    assert_eq!(lookup.attempts("slow.example.com"), 2);
}

#[tokio::test]
async fn second_timeout_counts_as_not_found() {
    let lookup = MockLookup::new(["slow.example.com"]).timing_out("slow.example.com", 5);
    assert_eq!(
        resolve_one(&lookup, "slow.example.com").await,
        Resolution::NotFound
    );
    assert_eq!(lookup.attempts("slow.example.com"), 2);
}

#[tokio::test]
async fn nxdomain_is_not_retried() {
    let lookup = MockLookup::new(Vec::<String>::new());
    assert_eq!(
        resolve_one(&lookup, "missing.example.com").await,
        Resolution::NotFound
    );
    assert_eq!(lookup.attempts("missing.example.com"), 1);
}

#[tokio::test]
async fn fatal_resolver_error_stops_the_batch() {
    let (lookup, dns) = resolver(MockLookup::always_fatal());
    let names: Vec<String> = (0..1000).map(|i| format!("n{i}.example.com")).collect();

    let mut callbacks = 0;
    let err = dns
        .resolve_batch(&names, 1, |_| callbacks += 1)
        .await
        .unwrap_err();

    assert!(matches!(err, DnsError::NameserverFailure { ref reason, .. } if reason == "SERVFAIL"));
    assert_eq!(callbacks, 0);
    assert!(
        lookup.calls() < names.len(),
        "{} lookups ran before the batch stopped",
        lookup.calls()
    );
}

#[test]
fn dns_pool_is_ten_times_the_thread_count_capped() {
    assert_eq!(dns_workers(25, 10_000), 250);
    assert_eq!(dns_workers(100, 10_000), 500);
    assert_eq!(dns_workers(25, 3), 3);
    assert_eq!(dns_workers(0, 10), 1);
}

const NOERROR: u8 = 0;
const SERVFAIL: u8 = 2;
const NXDOMAIN: u8 = 3;
const REFUSED: u8 = 5;

/// Nameserver on an ephemeral port that answers every query with `rcode`
/// and no records.
async fn nameserver_answering(rcode: u8) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 1232];
        while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
            let mut reply = buf[..len].to_vec();
            reply[2] |= 0x80;
            reply[3] = 0x80 | rcode;
            let _ = socket.send_to(&reply, peer).await;
        }
    });
    addr
}

async fn lookup_against(rcode: u8) -> HickoryLookup {
    let addr = nameserver_answering(rcode).await;
    HickoryLookup::with_nameserver_addrs(&[addr]).unwrap()
}

#[tokio::test]
async fn nxdomain_and_empty_answers_mean_not_found() {
    for rcode in [NXDOMAIN, NOERROR] {
        let lookup = lookup_against(rcode).await;
        assert_eq!(
            lookup.lookup("foo.example.com").await,
            Err(LookupError::NotFound),
            "rcode {rcode}"
        );
    }
}

#[tokio::test]
async fn server_failures_are_fatal() {
    for rcode in [SERVFAIL, REFUSED] {
        let lookup = lookup_against(rcode).await;
        assert!(
            matches!(
                lookup.lookup("foo.example.com").await,
                Err(LookupError::Fatal(_))
            ),
            "rcode {rcode}"
        );
        assert!(matches!(
            resolve_one(&lookup, "foo.example.com").await,
            Resolution::Fatal { .. }
        ));
    }
}

#[tokio::test]
async fn refusing_nameserver_stops_the_batch() {
    let dns = DnsBatchResolver::new(Arc::new(lookup_against(REFUSED).await));
    let names: Vec<String> = (0..50).map(|i| format!("n{i}.example.com")).collect();

    let err = dns.resolve_batch(&names, 1, |_| {}).await.unwrap_err();
    assert!(matches!(err, DnsError::NameserverFailure { .. }));
}
