use crate::configuration::DomainSettings;
use std::collections::HashMap;

/// Domain served when the configuration names none.
pub const DEFAULT_DOMAIN: &str = "example.com";

const DEFAULT_SENDER_LOCAL_PART: &str = "noreply";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DomainName(String);

impl DomainName {
    const MAX_LENGTH: usize = 253;

    pub fn parse(value: &str) -> Result<DomainName, String> {
        let value = value.trim().to_lowercase();
        if value.is_empty() || value.len() > Self::MAX_LENGTH {
            return Err(format!("'{}' is not a valid domain", value));
        }
        let valid_labels = value.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
        if !valid_labels {
            return Err(format!("'{}' is not a valid domain", value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DomainName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DomainName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<DomainName> for String {
    fn from(domain: DomainName) -> Self {
        domain.0
    }
}

/// The set of domains this gateway sends for, in configuration order, and the
/// sender used when a request does not name one.
#[derive(Debug, Clone)]
pub struct DomainRegistry {
    domains: Vec<DomainName>,
    senders: HashMap<DomainName, String>,
}

/// Which domain a message goes out under and the address it is sent from.
#[derive(Debug, Clone, PartialEq)]
pub struct SenderSelection {
    pub domain: DomainName,
    pub from: String,
}

impl DomainRegistry {
    pub fn from_settings(settings: &DomainSettings) -> DomainRegistry {
        let list = settings
            .list
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .or(settings.domain.as_deref());
        Self::parse(list.unwrap_or_default(), settings.senders.as_deref())
    }

    /// Parses a comma separated domain list and an optional comma separated
    /// `domain:sender` list.
    pub fn parse(domain_list: &str, sender_list: Option<&str>) -> DomainRegistry {
        let mut domains: Vec<DomainName> = Vec::new();
        for entry in domain_list.split(',').filter(|e| !e.trim().is_empty()) {
            match DomainName::parse(entry) {
                Ok(domain) if !domains.contains(&domain) => domains.push(domain),
                Ok(_) => {}
                Err(e) => tracing::warn!("Ignoring configured domain: {}", e),
            }
        }
        if domains.is_empty() {
            domains.push(DomainName(DEFAULT_DOMAIN.to_string()));
        }

        let mut senders = HashMap::new();
        for entry in sender_list
            .unwrap_or_default()
            .split(',')
            .filter(|e| !e.trim().is_empty())
        {
            let Some((domain, sender)) = entry.split_once(':') else {
                tracing::warn!("Ignoring sender mapping without a ':' separator: {}", entry);
                continue;
            };
            let sender = sender.trim();
            match DomainName::parse(domain) {
                Ok(domain) if !sender.is_empty() => {
                    senders.entry(domain).or_insert_with(|| sender.to_string());
                }
                Ok(domain) => tracing::warn!("Ignoring empty sender for domain {}", domain),
                Err(e) => tracing::warn!("Ignoring sender mapping: {}", e),
            }
        }

        Self { domains, senders }
    }

    pub fn domains(&self) -> &[DomainName] {
        &self.domains
    }

    pub fn primary(&self) -> &DomainName {
        &self.domains[0]
    }

    pub fn contains(&self, domain: &str) -> bool {
        let domain = domain.trim().to_lowercase();
        self.domains.iter().any(|d| d.as_str() == domain)
    }

    pub fn default_sender_for(&self, domain: &str) -> String {
        let domain = domain.trim().to_lowercase();
        DomainName::parse(&domain)
            .ok()
            .and_then(|d| self.senders.get(&d).cloned())
            .unwrap_or_else(|| format!("{}@{}", DEFAULT_SENDER_LOCAL_PART, domain))
    }

    /// An explicit sender address wins, then a known explicit domain, then the
    /// primary domain.
    pub fn select_sender(
        &self,
        from: Option<(&str, &str)>,
        domain: Option<&str>,
    ) -> SenderSelection {
        if let Some((address, address_domain)) = from {
            if let Ok(domain) = DomainName::parse(address_domain) {
                return SenderSelection {
                    domain,
                    from: address.to_string(),
                };
            }
        }
        if let Some(domain) = domain.filter(|d| self.contains(d)) {
            if let Ok(domain) = DomainName::parse(domain) {
                let from = self.default_sender_for(domain.as_str());
                return SenderSelection { domain, from };
            }
        }
        let primary = self.primary().clone();
        SenderSelection {
            from: self.default_sender_for(primary.as_str()),
            domain: primary,
        }
    }

    /// The registry domain a set of recipients belongs to, falling back to the
    /// first recipient's own domain and finally to the primary domain.
    pub fn owning_domain<'a, I>(&self, recipient_domains: I) -> DomainName
    where
        I: IntoIterator<Item = &'a str>,
    {
        let parsed: Vec<DomainName> = recipient_domains
            .into_iter()
            .filter_map(|d| DomainName::parse(d).ok())
            .collect();
        parsed
            .iter()
            .find(|d| self.domains.contains(d))
            .or_else(|| parsed.first())
            .cloned()
            .unwrap_or_else(|| self.primary().clone())
    }
}
