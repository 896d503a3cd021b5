//! End-to-end connection string tests: parse, filter, rebuild.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;

use mssql_connstr::{
    AllowList, ConnectionStringBuilder, ConnectionStringParser, DriverIdentity, ParseError,
    parse, resolve, resolve_with,
};
use proptest::prelude::*;

const NONE: [(&str, &str); 0] = [];

/// Canonical names a user may set.
const USER_KEYS: &[&str] = &[
    "Server",
    "Uid",
    "Pwd",
    "Database",
    "Encrypt",
    "TrustServerCertificate",
    "Connection Timeout",
    "Login Timeout",
    "ApplicationIntent",
    "Failover_Partner",
    "Packet Size",
];

fn reparse(built: &str) -> BTreeMap<String, String> {
    let allowlist = AllowList::standard();
    let parsed = ConnectionStringParser::new()
        .with_allowlist(allowlist)
        .allow_reserved(true)
        .parse(built)
        .expect("builder output must parse");
    allowlist.filter(parsed).accepted
}

// ============================================================================
// Parse -> Filter -> Build
// ============================================================================

#[test]
fn test_parse_filter_build_simple() {
    let parsed = parse("Server=localhost;Database=mydb;Encrypt=yes", None).unwrap();
    let filtered = AllowList::standard().filter(parsed);
    let built = ConnectionStringBuilder::from_params(filtered.accepted).build();

    assert!(built.starts_with("Driver={ODBC Driver 18 for SQL Server};"));
    assert!(built.contains("APP=mssql-odbc"));
    assert!(built.contains("Server=localhost"));
    assert!(built.contains("Database=mydb"));
    assert!(built.contains("Encrypt=yes"));
}

#[test]
fn test_parse_filter_build_braced_values() {
    let parsed = parse("Server={local;host};PWD={p@ss;w}}rd}", None).unwrap();
    let filtered = AllowList::standard().filter(parsed);
    let built = ConnectionStringBuilder::from_params(filtered.accepted).build();

    assert!(built.contains("Server={local;host}"));
    assert!(built.contains("Pwd={p@ss;w}}rd}"));
}

#[test]
fn test_reserved_keywords_in_string_rejected() {
    for input in [
        "APP=UserApp;Server=localhost",
        "Driver={Some Other Driver};Server=localhost",
        "Application Name=x;Server=localhost",
    ] {
        let errors = resolve(input, NONE).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ParseError::ReservedKeyword { .. })),
            "{input}"
        );
    }
}

#[test]
fn test_connect_style_errors_collected() {
    let errors = resolve("Server=first;InvalidEntry;Server=second;Database", NONE).unwrap_err();
    assert_eq!(errors.len(), 3);
    let message = errors.to_string();
    assert!(message.contains("Incomplete specification"));
    assert!(message.contains("Duplicate keyword"));
}

#[test]
fn test_unclosed_brace_through_resolve() {
    let errors = resolve("PWD={unclosed;Server=localhost", NONE).unwrap_err();
    assert!(errors.is_fatal());
    assert!(errors.to_string().contains("Unclosed braced value"));
}

#[test]
fn test_custom_identity() {
    let identity = DriverIdentity::new()
        .driver("ODBC Driver 17 for SQL Server")
        .application_name("reporting");
    let canonical = resolve_with("Server=db1", NONE, &identity).unwrap();
    assert_eq!(
        canonical.as_str(),
        "Driver={ODBC Driver 17 for SQL Server};APP=reporting;Server=db1"
    );
}

#[test]
fn test_round_trip_preserves_special_values() {
    let mut original = BTreeMap::new();
    original.insert("Server".to_string(), "tcp:host,1433".to_string());
    original.insert("Pwd".to_string(), "}{;= x {{}}".to_string());
    original.insert("Database".to_string(), " padded ".to_string());

    let built = ConnectionStringBuilder::from_params(original.clone()).build();
    assert_eq!(reparse(&built), original);
}

// ============================================================================
// Properties
// ============================================================================

fn simple_key() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,10}".prop_filter("reserved keyword", |k| {
        !mssql_connstr::is_reserved_keyword(k)
    })
}

proptest! {
    /// Unbraced `key=value` strings parse to exactly their pairs.
    #[test]
    fn prop_simple_pairs_parse_exactly(
        pairs in prop::collection::btree_map(simple_key(), "[A-Za-z0-9@.:,_-]{0,12}", 0..8)
    ) {
        let input = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k.to_uppercase(), v))
            .collect::<Vec<_>>()
            .join(";");

        let parsed = parse(&input, None).unwrap();
        prop_assert_eq!(parsed.into_map(), pairs);
    }

    /// Escaping is fully reversible: build(parse(build(m))) == build(m).
    #[test]
    fn prop_build_parse_round_trip(
        values in prop::collection::vec("\\PC{0,16}", USER_KEYS.len())
    ) {
        let original: BTreeMap<String, String> = USER_KEYS
            .iter()
            .zip(values)
            .map(|(k, v)| ((*k).to_string(), v))
            .collect();

        let built = ConnectionStringBuilder::from_params(original.clone()).build();
        let recovered = reparse(&built);
        prop_assert_eq!(&recovered, &original);

        let rebuilt = ConnectionStringBuilder::from_params(recovered).build();
        prop_assert_eq!(rebuilt, built);
    }
}
