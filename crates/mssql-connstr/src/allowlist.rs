//! Allow-list of connection string keywords.
//!
//! Every keyword a user may pass is listed here together with its synonyms.
//! Lookups are case-insensitive and ignore surrounding whitespace, and always
//! produce the canonical spelling that ends up in the rebuilt string.
//!
//! Two canonical names, [`DRIVER`] and [`APPLICATION_NAME`], are reserved:
//! they are recognized so they can be rejected with a precise error, but only
//! the builder may set them.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;

/// Canonical name of the driver identity keyword.
pub const DRIVER: &str = "Driver";

/// Canonical name of the application name keyword.
pub const APPLICATION_NAME: &str = "APP";

/// Canonical name of the password keyword.
pub const PASSWORD: &str = "Pwd";

/// Canonical names that user input may never set.
pub const RESERVED: [&str; 2] = [DRIVER, APPLICATION_NAME];

/// Lowercase synonym to canonical name.
const SYNONYMS: &[(&str, &str)] = &[
    // Server identification
    ("server", "Server"),
    ("host", "Server"),
    ("address", "Server"),
    ("addr", "Server"),
    ("network address", "Server"),
    // Authentication
    ("uid", "Uid"),
    ("user id", "Uid"),
    ("user", "Uid"),
    ("pwd", PASSWORD),
    ("password", PASSWORD),
    ("authentication", "Authentication"),
    ("trusted_connection", "Trusted_Connection"),
    // Database
    ("database", "Database"),
    ("initial catalog", "Database"),
    // Reserved
    ("driver", DRIVER),
    ("app", APPLICATION_NAME),
    ("application name", APPLICATION_NAME),
    // Encryption
    ("encrypt", "Encrypt"),
    ("trustservercertificate", "TrustServerCertificate"),
    ("trust_server_certificate", "TrustServerCertificate"),
    ("trust server certificate", "TrustServerCertificate"),
    ("hostnameincertificate", "HostNameInCertificate"),
    // Connection behavior
    ("connection timeout", "Connection Timeout"),
    ("connect timeout", "Connection Timeout"),
    ("timeout", "Connection Timeout"),
    ("login timeout", "Login Timeout"),
    ("multisubnetfailover", "MultiSubnetFailover"),
    ("multi subnet failover", "MultiSubnetFailover"),
    ("applicationintent", "ApplicationIntent"),
    ("application intent", "ApplicationIntent"),
    // Failover
    ("failover partner", "Failover_Partner"),
    ("failoverpartner", "Failover_Partner"),
    // Packet size
    ("packet size", "Packet Size"),
    ("packetsize", "Packet Size"),
];

static STANDARD: Lazy<AllowList> = Lazy::new(|| AllowList::from_entries(SYNONYMS.iter().copied()));

/// The table of permitted keywords and their synonyms.
#[derive(Debug)]
pub struct AllowList {
    table: HashMap<String, &'static str>,
}

/// Result of running a parameter map through [`AllowList::filter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filtered {
    /// Accepted parameters keyed by canonical name.
    pub accepted: BTreeMap<String, String>,
    /// Keys not present in the allow-list, as given.
    pub rejected: Vec<String>,
    /// Keys that name a reserved parameter, as given.
    pub reserved: Vec<String>,
}

impl AllowList {
    /// Build an allow-list from `(synonym, canonical)` pairs.
    ///
    /// Synonyms are matched case-insensitively, so they are stored
    /// lowercased. A canonical name is only accepted as a keyword if it is
    /// also listed as a synonym of itself. Canonical names matching
    /// [`RESERVED`] stay reserved.
    ///
    /// ```rust
    /// use mssql_connstr::{AllowList, parse};
    ///
    /// let narrow = AllowList::from_entries([("server", "Server"), ("host", "Server")]);
    /// let params = parse("HOST=db1", Some(&narrow)).unwrap();
    /// assert_eq!(params.get("host"), Some("db1"));
    /// assert!(parse("Database=x", Some(&narrow)).is_err());
    /// ```
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, &'static str)>,
        S: AsRef<str>,
    {
        Self {
            table: entries
                .into_iter()
                .map(|(synonym, canonical)| (synonym.as_ref().trim().to_lowercase(), canonical))
                .collect(),
        }
    }

    /// The allow-list used by the driver.
    #[must_use]
    pub fn standard() -> &'static Self {
        &STANDARD
    }

    /// Map a keyword to its canonical name.
    ///
    /// Returns `None` for keywords that are not allowed. Reserved keywords do
    /// map to their canonical name; use [`AllowList::is_reserved`] to tell
    /// them apart.
    #[must_use]
    pub fn normalize(&self, key: &str) -> Option<&'static str> {
        let key = key.trim();
        if let Some(canonical) = self.table.get(key) {
            return Some(*canonical);
        }
        self.table.get(key.to_lowercase().as_str()).copied()
    }

    /// Whether the keyword names a reserved parameter.
    #[must_use]
    pub fn is_reserved(&self, key: &str) -> bool {
        self.normalize(key).is_some_and(is_reserved_canonical)
    }

    /// Whether the keyword is known, reserved or not.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.normalize(key).is_some()
    }

    /// Normalize a whole parameter map.
    ///
    /// Later entries win when two synonyms map to the same canonical name.
    pub fn filter<I, K, V>(&self, params: I) -> Filtered
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut filtered = Filtered::default();

        for (key, value) in params {
            let key = key.as_ref();
            match self.normalize(key) {
                Some(canonical) if is_reserved_canonical(canonical) => {
                    filtered.reserved.push(key.to_string());
                }
                Some(canonical) => {
                    filtered.accepted.insert(canonical.to_string(), value.into());
                }
                None => {
                    filtered.rejected.push(key.to_string());
                }
            }
        }

        filtered
    }

    /// Iterate over `(synonym, canonical)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &'static str)> + '_ {
        self.table.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Map a keyword to its canonical name using the standard allow-list.
#[must_use]
pub fn normalize_key(key: &str) -> Option<&'static str> {
    AllowList::standard().normalize(key)
}

/// Whether the keyword names a reserved parameter in the standard allow-list.
#[must_use]
pub fn is_reserved_keyword(key: &str) -> bool {
    AllowList::standard().is_reserved(key)
}

fn is_reserved_canonical(canonical: &str) -> bool {
    RESERVED.iter().any(|reserved| *reserved == canonical)
}
