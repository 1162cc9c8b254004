//! # Doctype Selectors
//!
//! A doctype picks a subset of the configuration by product, docset,
//! lifecycle and language. The textual form is
//!
//! ```text
//! [PRODUCT]/[DOCSETS][@LIFECYCLES]/LANGS
//! ```
//!
//! where `DOCSETS` and `LANGS` are comma separated and `LIFECYCLES` are
//! separated by `,` or `|`. An omitted product or docset means `*`, an
//! omitted lifecycle means `unknown`, which does not filter at all.
//!
//! ```
//! use docbuild::doctype::Doctype;
//!
//! let doctype: Doctype = "sles/16,15-SP6@supported/en-us".parse().unwrap();
//! assert!(doctype.matches_product("sles"));
//! assert!(doctype.matches_docset("15-SP6", Some("supported")));
//! assert!(!doctype.matches_docset("15-SP6", Some("beta")));
//! assert_eq!(doctype.to_string(), "sles/15-SP6,16@supported/en-us");
//! ```

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::error::{Error, Result};

/// Set of lifecycle states.
///
/// The empty set is `unknown` and, used as a filter, matches every docset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lifecycle(u8);

impl Lifecycle {
    pub const UNKNOWN: Lifecycle = Lifecycle(0);
    pub const SUPPORTED: Lifecycle = Lifecycle(1);
    pub const BETA: Lifecycle = Lifecycle(1 << 1);
    pub const HIDDEN: Lifecycle = Lifecycle(1 << 2);
    pub const UNSUPPORTED: Lifecycle = Lifecycle(1 << 3);

    const NAMED: [(&'static str, Lifecycle); 4] = [
        ("supported", Lifecycle::SUPPORTED),
        ("beta", Lifecycle::BETA),
        ("hidden", Lifecycle::HIDDEN),
        ("unsupported", Lifecycle::UNSUPPORTED),
    ];

    pub fn is_unknown(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: Lifecycle) -> Lifecycle {
        Lifecycle(self.0 | other.0)
    }

    /// Whether every flag of `other` is also set in `self`.
    pub fn contains(self, other: Lifecycle) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether a docset with the given `lifecycle` attribute passes this filter.
    pub fn admits(self, lifecycle: Option<&str>) -> bool {
        if self.is_unknown() {
            return true;
        }
        match lifecycle.and_then(|value| value.parse::<Lifecycle>().ok()) {
            Some(state) if !state.is_unknown() => self.0 & state.0 != 0,
            _ => false,
        }
    }
}

impl FromStr for Lifecycle {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let mut flags = Lifecycle::UNKNOWN;
        for part in value.split([',', '|']).map(str::trim) {
            if part.is_empty() || part == "unknown" {
                continue;
            }
            let flag = Lifecycle::NAMED
                .iter()
                .find(|(name, _)| *name == part)
                .map(|(_, flag)| *flag)
                .ok_or_else(|| Error::Doctype {
                    value: value.to_string(),
                    message: format!(
                        "invalid lifecycle '{}' (allowed: unknown, supported, beta, hidden, unsupported)",
                        part
                    ),
                })?;
            flags = flags.union(flag);
        }
        Ok(flags)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return f.write_str("unknown");
        }
        let names: Vec<&str> = Lifecycle::NAMED
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect();
        f.write_str(&names.join("|"))
    }
}

/// One component of a doctype: `*` or an explicit, sorted set of values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Selector {
    Any,
    Values(Vec<String>),
}

impl Selector {
    fn parse(value: Option<&str>) -> Selector {
        match value {
            None | Some("*") | Some("") => Selector::Any,
            Some(list) => {
                let mut values: Vec<String> = list
                    .split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
                if values.iter().any(|v| v == "*") || values.is_empty() {
                    return Selector::Any;
                }
                values.sort();
                values.dedup();
                Selector::Values(values)
            }
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Selector::Any)
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Selector::Any => true,
            Selector::Values(values) => values.iter().any(|v| v == value),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Any => f.write_str("*"),
            Selector::Values(values) => f.write_str(&values.join(",")),
        }
    }
}

/// A parsed doctype selector.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Doctype {
    pub product: Selector,
    pub docsets: Selector,
    pub lifecycle: Lifecycle,
    pub langs: Selector,
}

impl Doctype {
    pub fn matches_product(&self, productid: &str) -> bool {
        self.product.matches(productid)
    }

    /// Whether a docset with this id and `lifecycle` attribute is selected.
    pub fn matches_docset(&self, setid: &str, lifecycle: Option<&str>) -> bool {
        self.docsets.matches(setid) && self.lifecycle.admits(lifecycle)
    }

    pub fn matches_lang(&self, lang: &str) -> bool {
        self.langs.matches(lang)
    }
}

fn validate_langs(value: &str, langs: &Selector) -> Result<()> {
    if let Selector::Values(values) = langs {
        if let Some(bad) = values
            .iter()
            .find(|lang| !crate::xml::checks::is_valid_language(lang))
        {
            return Err(Error::Doctype {
                value: value.to_string(),
                message: format!("invalid language '{}' (expected e.g. 'en-us')", bad),
            });
        }
    }
    Ok(())
}

impl FromStr for Doctype {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let pattern = Regex::new(
            r"^(?:([^/@]+|\*))?/(?:([^/@]+|\*))?(?:@([a-z]+(?:[,|][a-z]+)*))?/(\*|[\w-]+(?:,[\w-]+)*)$",
        )?;
        let captures = pattern.captures(value.trim()).ok_or_else(|| Error::Doctype {
            value: value.to_string(),
            message: "expected [PRODUCT]/[DOCSETS][@LIFECYCLES]/LANGS".to_string(),
        })?;
        let group = |index: usize| captures.get(index).map(|m| m.as_str());

        let langs = Selector::parse(group(4));
        validate_langs(value, &langs)?;

        Ok(Doctype {
            product: Selector::parse(group(1)),
            docsets: Selector::parse(group(2)),
            lifecycle: group(3).map(str::parse::<Lifecycle>).transpose()?.unwrap_or_default(),
            langs,
        })
    }
}

impl fmt::Display for Doctype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}/{}",
            self.product, self.docsets, self.lifecycle, self.langs
        )
    }
}
