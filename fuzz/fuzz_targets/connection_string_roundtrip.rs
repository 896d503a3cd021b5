#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mssql_connstr::{AllowList, ConnectionStringBuilder, ConnectionStringParser};

/// Values for a fixed set of user keywords.
#[derive(Debug, Arbitrary)]
struct FuzzParams {
    server: Option<String>,
    uid: Option<String>,
    pwd: Option<String>,
    database: Option<String>,
    encrypt: Option<String>,
}

fuzz_target!(|input: FuzzParams| {
    let mut params = BTreeMap::new();
    for (key, value) in [
        ("Server", input.server),
        ("Uid", input.uid),
        ("Pwd", input.pwd),
        ("Database", input.database),
        ("Encrypt", input.encrypt),
    ] {
        if let Some(value) = value {
            params.insert(key.to_string(), value);
        }
    }

    let built = ConnectionStringBuilder::from_params(params.clone()).build();

    let allowlist = AllowList::standard();
    let parsed = ConnectionStringParser::new()
        .with_allowlist(allowlist)
        .allow_reserved(true)
        .parse(&built)
        .expect("builder output must parse");
    let recovered = allowlist.filter(parsed).accepted;

    assert_eq!(recovered, params);
    assert_eq!(ConnectionStringBuilder::from_params(recovered).build(), built);
});
