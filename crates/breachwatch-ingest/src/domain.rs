//! Hostname decomposition
//!
//! Splits the site column of a dump line into a registrable-looking domain
//! (last two labels) and an optional subdomain. No public suffix list is
//! consulted, so `other.co.uk` yields domain `co.uk` and subdomain `other`.

use url::Url;

/// Domain and optional subdomain extracted from a site string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainParts {
    pub domain: String,
    pub subdomain: Option<String>,
}

impl DomainParts {
    fn verbatim(raw: &str) -> Self {
        Self {
            domain: raw.to_string(),
            subdomain: None,
        }
    }
}

/// Decompose a URL or bare hostname
///
/// Inputs without an `http://` or `https://` prefix are parsed as if they had
/// `https://`. Anything that still fails to parse is returned verbatim as the
/// domain. This never fails.
pub fn decompose(raw: &str) -> DomainParts {
    let candidate = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    let parsed = match Url::parse(&candidate) {
        Ok(url) => url,
        Err(_) => return DomainParts::verbatim(raw),
    };

    match parsed.host_str() {
        Some(host) if !host.is_empty() => split_host(host),
        _ => DomainParts::verbatim(raw),
    }
}

fn split_host(host: &str) -> DomainParts {
    let labels: Vec<&str> = host.split('.').collect();

    if labels.len() <= 2 {
        return DomainParts {
            domain: host.to_string(),
            subdomain: None,
        };
    }

    let (sub, registrable) = labels.split_at(labels.len() - 2);
    let subdomain = sub.join(".");

    DomainParts {
        domain: registrable.join("."),
        subdomain: (!subdomain.is_empty()).then_some(subdomain),
    }
}
