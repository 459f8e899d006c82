//! URL → strategy classification.
//!
//! The table is an explicitly ordered list of `(class, patterns)` pairs. Classes
//! are tried in `StrategyClass::PRIORITY` order and the first class with a
//! matching pattern wins, so reordering the table changes routing. URLs no
//! pattern matches are served network-first.

use std::fmt;

use regex::RegexSet;
use serde::{Deserialize, Serialize};
use shelter_core::Error;
use shelter_core::config::RouteConfig;

/// The four caching algorithms a request can be served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyClass {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    NetworkOnly,
}

impl StrategyClass {
    /// Evaluation order of the route table.
    pub const PRIORITY: [StrategyClass; 4] = [
        StrategyClass::CacheFirst,
        StrategyClass::NetworkFirst,
        StrategyClass::StaleWhileRevalidate,
        StrategyClass::NetworkOnly,
    ];

    /// Class used when no pattern matches.
    pub const DEFAULT: StrategyClass = StrategyClass::NetworkFirst;

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyClass::CacheFirst => "cache-first",
            StrategyClass::NetworkFirst => "network-first",
            StrategyClass::StaleWhileRevalidate => "stale-while-revalidate",
            StrategyClass::NetworkOnly => "network-only",
        }
    }
}

impl fmt::Display for StrategyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiled, ordered strategy table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<(StrategyClass, RegexSet)>,
}

impl RouteTable {
    /// Compile the configured pattern lists in priority order.
    pub fn new(config: &RouteConfig) -> Result<Self, Error> {
        let routes = StrategyClass::PRIORITY
            .iter()
            .map(|&class| {
                let patterns = match class {
                    StrategyClass::CacheFirst => &config.cache_first,
                    StrategyClass::NetworkFirst => &config.network_first,
                    StrategyClass::StaleWhileRevalidate => &config.stale_while_revalidate,
                    StrategyClass::NetworkOnly => &config.network_only,
                };
                let set = RegexSet::new(patterns).map_err(|e| Error::InvalidPattern(format!("{class}: {e}")))?;
                Ok((class, set))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self { routes })
    }

    /// Strategy class for an absolute URL.
    pub fn classify(&self, url: &str) -> StrategyClass {
        self.routes
            .iter()
            .find(|(_, set)| set.is_match(url))
            .map(|(class, _)| *class)
            .unwrap_or(StrategyClass::DEFAULT)
    }

    /// Whether `url` is on the network-only list, which is also the
    /// cross-origin allow-list.
    pub fn is_network_only(&self, url: &str) -> bool {
        self.routes
            .iter()
            .any(|(class, set)| *class == StrategyClass::NetworkOnly && set.is_match(url))
    }
}
