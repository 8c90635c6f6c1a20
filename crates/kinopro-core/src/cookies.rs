//! Persistent cookie jar
//!
//! [`SessionJar`] is plugged into reqwest as its cookie provider, so every
//! `Set-Cookie` the site sends lands here. The jar can be written to and read
//! back from a Netscape cookie file (the format browsers and curl export),
//! which is how logged-in sessions survive between runs.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use cookie_store::{CookieDomain, CookieExpiration, RawCookie};
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use reqwest::Url;
use time::OffsetDateTime;
use tracing::{debug, warn};

const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";

/// A single stored cookie, in the shape of one Netscape cookie file line.
///
/// The value is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredCookie {
    /// Domain without leading dot, lowercase
    pub domain: String,
    /// Whether subdomains of `domain` also receive the cookie
    pub include_subdomains: bool,
    /// Path scope
    pub path: String,
    /// Only sent over https
    pub secure: bool,
    /// Unix timestamp of expiry, 0 for a session cookie
    pub expires: u64,
    /// Cookie name
    pub name: String,
    value: String,
}

impl StoredCookie {
    /// Creates a cookie entry.
    pub fn new(
        domain: impl Into<String>,
        include_subdomains: bool,
        path: impl Into<String>,
        secure: bool,
        expires: u64,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let domain: String = domain.into();
        Self {
            domain: domain.trim_start_matches('.').to_ascii_lowercase(),
            include_subdomains,
            path: path.into(),
            secure,
            expires,
            name: name.into(),
            value: value.into(),
        }
    }

    /// Cookie value. Never log it.
    pub fn value(&self) -> &str {
        &self.value
    }

    fn is_expired(&self, now: u64) -> bool {
        self.expires != 0 && self.expires <= now
    }

    fn from_store(cookie: &cookie_store::Cookie<'_>) -> Option<Self> {
        let (domain, include_subdomains) = match &cookie.domain {
            CookieDomain::HostOnly(host) => (host.clone(), false),
            CookieDomain::Suffix(suffix) => (suffix.clone(), true),
            CookieDomain::NotPresent | CookieDomain::Empty => return None,
        };
        let expires = match cookie.expires {
            CookieExpiration::AtUtc(at) => u64::try_from(at.unix_timestamp()).unwrap_or(0).max(1),
            CookieExpiration::SessionEnd => 0,
        };
        Some(Self::new(
            domain,
            include_subdomains,
            String::from(&cookie.path),
            cookie.secure().unwrap_or(false),
            expires,
            cookie.name(),
            cookie.value(),
        ))
    }

    /// The cookie as it would have arrived in a `Set-Cookie` header.
    fn to_raw(&self) -> RawCookie<'static> {
        let mut builder = RawCookie::build((self.name.clone(), self.value.clone()))
            .path(self.path.clone())
            .secure(self.secure);
        if self.include_subdomains {
            builder = builder.domain(self.domain.clone());
        }
        if let Some(at) = i64::try_from(self.expires)
            .ok()
            .filter(|&secs| secs != 0)
            .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        {
            builder = builder.expires(at);
        }
        builder.build()
    }

    /// A URL the cookie could have been set from.
    fn origin(&self) -> Option<Url> {
        let scheme = if self.secure { "https" } else { "http" };
        Url::parse(&format!("{}://{}{}", scheme, self.domain, self.path)).ok()
    }

    fn to_netscape_line(&self) -> String {
        let domain = if self.include_subdomains {
            format!(".{}", self.domain)
        } else {
            self.domain.clone()
        };
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            domain,
            netscape_bool(self.include_subdomains),
            self.path,
            netscape_bool(self.secure),
            self.expires,
            self.name,
            self.value
        )
    }
}

impl fmt::Debug for StoredCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCookie")
            .field("domain", &self.domain)
            .field("include_subdomains", &self.include_subdomains)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("expires", &self.expires)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Thread-safe cookie jar used as reqwest's cookie provider.
///
/// Scoping and expiry follow RFC 6265 through [`cookie_store`]. Iteration
/// order is stable: by domain, then path, then name, each in first-seen order.
#[derive(Debug, Default)]
pub struct SessionJar {
    store: Mutex<cookie_store::CookieStore>,
}

impl SessionJar {
    /// Creates an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, cookie_store::CookieStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a cookie, replacing any cookie with the same domain, path and name.
    ///
    /// Returns `false` when the cookie is expired or its scope is rejected.
    pub fn insert(&self, cookie: StoredCookie) -> bool {
        if cookie.include_subdomains && !cookie.domain.contains('.') {
            debug!(name = %cookie.name, "rejecting cookie scoped to a top-level domain");
            return false;
        }
        let Some(origin) = cookie.origin() else {
            warn!(name = %cookie.name, "cookie domain is not a valid host");
            return false;
        };
        match cookie_store::Cookie::try_from_raw_cookie(&cookie.to_raw(), &origin) {
            Ok(parsed) => store_cookie(&mut self.lock(), parsed.into_owned(), &origin),
            Err(e) => {
                debug!(name = %cookie.name, error = %e, "cookie rejected");
                false
            }
        }
    }

    /// Whether a live cookie named `name` would be sent to `url`.
    pub fn contains(&self, name: &str, url: &Url) -> bool {
        self.lock().matches(url).iter().any(|c| c.name() == name)
    }

    /// All cookies stored for `domain` (leading dot ignored).
    pub fn cookies_for_domain(&self, domain: &str) -> Vec<StoredCookie> {
        let domain = domain.trim_start_matches('.').to_ascii_lowercase();
        self.snapshot()
            .into_iter()
            .filter(|c| c.domain == domain)
            .collect()
    }

    /// Copy of every live cookie.
    pub fn snapshot(&self) -> Vec<StoredCookie> {
        self.lock()
            .iter_unexpired()
            .filter_map(StoredCookie::from_store)
            .collect()
    }

    /// Copies every cookie of `other` into this jar, overwriting same-slot entries.
    pub fn merge_from(&self, other: &SessionJar) {
        for cookie in other.snapshot() {
            self.insert(cookie);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().iter_unexpired().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads a Netscape cookie file.
    ///
    /// Comment and blank lines are ignored, malformed lines are skipped with a
    /// warning and expired cookies are dropped. Only the line terminator is
    /// stripped, so empty values and trailing blanks in a value survive.
    ///
    /// # Errors
    /// Returns the underlying I/O error when the file cannot be opened or read.
    pub fn load(path: &Path) -> io::Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let jar = Self::new();
        let now = unix_now();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end_matches(['\r', '\n']);
            let is_comment = line.starts_with('#') && !line.starts_with("#HttpOnly_");
            if line.trim().is_empty() || is_comment {
                continue;
            }
            match parse_netscape_line(line) {
                Some(cookie) if cookie.is_expired(now) => {
                    debug!(line = idx + 1, name = %cookie.name, "dropping expired cookie");
                }
                Some(cookie) => {
                    if !jar.insert(cookie) {
                        warn!(line = idx + 1, "skipping cookie with a rejected scope");
                    }
                }
                None => warn!(line = idx + 1, "skipping malformed cookie line"),
            }
        }

        debug!(path = %path.display(), cookies = jar.len(), "loaded cookie file");
        Ok(jar)
    }

    /// Writes the jar as a Netscape cookie file, replacing `path` atomically.
    ///
    /// Session cookies are written as well, with an expiry of 0.
    ///
    /// # Errors
    /// Returns the underlying I/O error when the temp file cannot be written or renamed.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        writeln!(file, "{NETSCAPE_HEADER}")?;
        for cookie in self.snapshot() {
            writeln!(file, "{}", cookie.to_netscape_line())?;
        }
        file.flush()?;
        file.persist(path).map_err(|e| e.error)?;

        debug!(path = %path.display(), "saved cookie file");
        Ok(())
    }
}

impl CookieStore for SessionJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let mut store = self.lock();
        for header in cookie_headers {
            let Ok(header) = header.to_str() else {
                continue;
            };
            match cookie_store::Cookie::parse(header, url) {
                Ok(cookie) => {
                    store_cookie(&mut store, cookie.into_owned(), url);
                }
                Err(e) => debug!(host = url.host_str(), error = %e, "ignoring Set-Cookie header"),
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .lock()
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}

/// Inserts a parsed cookie received from `url`. An expired cookie deletes
/// its slot instead.
fn store_cookie(
    store: &mut cookie_store::CookieStore,
    mut cookie: cookie_store::Cookie<'static>,
    url: &Url,
) -> bool {
    if !narrow_bare_domain(&mut cookie, url) {
        debug!(name = cookie.name(), "rejecting cookie scoped to a top-level domain");
        return false;
    }
    if cookie.is_expired() {
        if let Some(domain) = cookie.domain.as_cow() {
            store.remove(&domain, &cookie.path, cookie.name());
        }
        debug!(name = cookie.name(), "cookie removed by server");
        return false;
    }

    let name = cookie.name().to_string();
    match store.insert(cookie, url) {
        Ok(_) => {
            debug!(name, "cookie stored");
            true
        }
        Err(e) => {
            debug!(name, error = %e, "cookie rejected");
            false
        }
    }
}

/// A `Domain` attribute without a dot (`uz`, `com`) would hand the cookie to
/// every site under that label. It is only kept when it names the request
/// host itself, and then as a host-only cookie.
fn narrow_bare_domain(cookie: &mut cookie_store::Cookie<'_>, url: &Url) -> bool {
    let bare = match &cookie.domain {
        CookieDomain::Suffix(suffix) if !suffix.contains('.') => suffix.clone(),
        _ => return true,
    };
    if url.host_str() != Some(bare.as_str()) {
        return false;
    }
    cookie.domain = CookieDomain::HostOnly(bare);
    true
}

fn netscape_bool(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

fn parse_netscape_line(line: &str) -> Option<StoredCookie> {
    let line = line.strip_prefix("#HttpOnly_").unwrap_or(line);
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 7
        || fields[0].is_empty()
        || !fields[2].starts_with('/')
        || fields[5].is_empty()
    {
        return None;
    }
    let parse_bool = |value: &str| match value {
        "TRUE" => Some(true),
        "FALSE" => Some(false),
        _ => None,
    };
    Some(StoredCookie::new(
        fields[0],
        parse_bool(fields[1])?,
        fields[2],
        parse_bool(fields[3])?,
        fields[4].parse().ok()?,
        fields[5],
        fields[6],
    ))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
