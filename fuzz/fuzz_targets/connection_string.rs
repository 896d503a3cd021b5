#![no_main]

use libfuzzer_sys::fuzz_target;
use mssql_connstr::{AllowList, parse, resolve};

const NONE: [(&str, &str); 0] = [];

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    match parse(s, None) {
        Ok(params) => {
            for (key, _) in params.iter() {
                assert!(!mssql_connstr::is_reserved_keyword(key));
            }
        }
        Err(errors) => {
            assert!(!errors.is_empty());
            if errors.is_fatal() {
                assert_eq!(errors.len(), 1);
            }
        }
    }

    let _ = parse(s, Some(AllowList::standard()));

    if let Ok(canonical) = resolve(s, NONE) {
        assert!(canonical.as_str().starts_with("Driver="));
        assert!(!canonical.redacted().is_empty());
    }
});
