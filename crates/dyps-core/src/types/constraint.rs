//! Version constraints and their intersection.
//!
//! Every requester of a repository contributes one `VersionConstraint`; the
//! resolver folds them together with [`VersionConstraint::intersect`] and an
//! empty result is a conflict.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::{Version, VersionId};
use crate::error::{DypsError, DypsResult};

/// Predicate over version identifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionConstraint {
    /// Floating reference: any version, newest preferred
    Any,
    /// Exact pin (=1.5)
    Exact(Version),
    /// Bounded range (>=1.0, <2.0)
    Range(VersionRange),
    /// Pinned branch or other named reference (@main)
    Ref(String),
}

/// Range of versions; a missing bound is unbounded on that side
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

/// One side of a range
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

impl Bound {
    pub fn inclusive(version: Version) -> Self {
        Self { version, inclusive: true }
    }

    pub fn exclusive(version: Version) -> Self {
        Self { version, inclusive: false }
    }
}

impl VersionRange {
    /// Range with only a lower bound
    pub fn at_least(version: Version) -> Self {
        Self {
            lower: Some(Bound::inclusive(version)),
            upper: None,
        }
    }

    /// Half-open range [lower, upper)
    pub fn between(lower: Version, upper: Version) -> Self {
        Self {
            lower: Some(Bound::inclusive(lower)),
            upper: Some(Bound::exclusive(upper)),
        }
    }

    /// Check if a version lies inside the range
    pub fn contains(&self, version: &Version) -> bool {
        let above_lower = match &self.lower {
            None => true,
            Some(bound) => match version.cmp_precedence(&bound.version) {
                Ordering::Greater => true,
                Ordering::Equal => bound.inclusive,
                Ordering::Less => false,
            },
        };
        let below_upper = match &self.upper {
            None => true,
            Some(bound) => match version.cmp_precedence(&bound.version) {
                Ordering::Less => true,
                Ordering::Equal => bound.inclusive,
                Ordering::Greater => false,
            },
        };
        above_lower && below_upper
    }

    /// Intersect two ranges, `None` when nothing lies in both
    pub fn intersect(&self, other: &Self) -> Option<VersionRange> {
        let lower = tighter(&self.lower, &other.lower, Ordering::Greater);
        let upper = tighter(&self.upper, &other.upper, Ordering::Less);
        let range = VersionRange { lower, upper };
        if range.is_empty() {
            None
        } else {
            Some(range)
        }
    }

    /// True when no version can satisfy both bounds
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => match lower.version.cmp_precedence(&upper.version) {
                Ordering::Greater => true,
                Ordering::Equal => !(lower.inclusive && upper.inclusive),
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    fn is_bounded(&self) -> bool {
        self.lower.is_some() && self.upper.is_some()
    }
}

/// Pick the stricter of two optional bounds; `prefer` is the ordering that wins
fn tighter(a: &Option<Bound>, b: &Option<Bound>, prefer: Ordering) -> Option<Bound> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (Some(x), Some(y)) => {
            let ordering = x.version.cmp_precedence(&y.version);
            if ordering == prefer {
                Some(x.clone())
            } else if ordering == Ordering::Equal {
                Some(Bound {
                    version: x.version.clone(),
                    inclusive: x.inclusive && y.inclusive,
                })
            } else {
                Some(y.clone())
            }
        },
    }
}

impl VersionConstraint {
    /// Parse a constraint string
    ///
    /// Accepts `*`/`latest`/empty, exact pins (`1.5`, `=1.5`), comma separated
    /// comparators (`>=1.0,<2.0`, `^1.2`, `~1.2.3`) and named references
    /// (`@main`, or a bare name that is not a version).
    pub fn parse(input: &str) -> DypsResult<Self> {
        let trimmed = input.trim();

        if trimmed.is_empty() || trimmed == "*" || trimmed.eq_ignore_ascii_case("latest") {
            return Ok(VersionConstraint::Any);
        }

        if let Some(name) = trimmed.strip_prefix('@') {
            return Self::reference(input, name);
        }

        let starts_with_operator = trimmed.starts_with(['^', '~', '<', '>', '=']);
        if starts_with_operator || trimmed.contains(',') {
            return Self::parse_comparators(input, trimmed);
        }

        match Version::from_str(trimmed) {
            Ok(version) => Ok(VersionConstraint::Exact(version)),
            Err(_) => Self::reference(input, trimmed),
        }
    }

    fn reference(input: &str, name: &str) -> DypsResult<Self> {
        let valid = !name.is_empty()
            && !name.chars().any(|c| c.is_whitespace() || c == ',' || c == '@');
        if !valid {
            return Err(DypsError::InvalidConstraint {
                input: input.to_string(),
                reason: "reference names must be non-empty and contain no whitespace or commas"
                    .to_string(),
            });
        }
        Ok(VersionConstraint::Ref(name.to_string()))
    }

    fn parse_comparators(input: &str, trimmed: &str) -> DypsResult<Self> {
        let mut combined = VersionConstraint::Any;
        for part in trimmed.split(',') {
            let comparator = Self::parse_comparator(input, part.trim())?;
            combined = combined.intersect(&comparator).ok_or_else(|| {
                DypsError::InvalidConstraint {
                    input: input.to_string(),
                    reason: "comparators exclude every version".to_string(),
                }
            })?;
        }
        Ok(combined)
    }

    fn parse_comparator(input: &str, part: &str) -> DypsResult<Self> {
        if part == "*" {
            return Ok(VersionConstraint::Any);
        }

        let version = |text: &str| -> DypsResult<Version> {
            Version::from_str(text.trim()).map_err(|e| DypsError::InvalidConstraint {
                input: input.to_string(),
                reason: e.to_string(),
            })
        };

        let overflow = |text: &str| DypsError::InvalidConstraint {
            input: input.to_string(),
            reason: format!("no version above {} fits in a version component", text.trim()),
        };

        let range = if let Some(rest) = part.strip_prefix(">=") {
            VersionRange::at_least(version(rest)?)
        } else if let Some(rest) = part.strip_prefix("<=") {
            VersionRange {
                lower: None,
                upper: Some(Bound::inclusive(version(rest)?)),
            }
        } else if let Some(rest) = part.strip_prefix('>') {
            VersionRange {
                lower: Some(Bound::exclusive(version(rest)?)),
                upper: None,
            }
        } else if let Some(rest) = part.strip_prefix('<') {
            VersionRange {
                lower: None,
                upper: Some(Bound::exclusive(version(rest)?)),
            }
        } else if let Some(rest) = part.strip_prefix('^') {
            let base = version(rest)?;
            let significant = base
                .release
                .iter()
                .position(|&n| n != 0)
                .map(|index| index + 1)
                .unwrap_or(base.release.len());
            let upper = base.bump(significant).ok_or_else(|| overflow(rest))?;
            VersionRange::between(base, upper)
        } else if let Some(rest) = part.strip_prefix('~') {
            let base = version(rest)?;
            let kept = if base.release.len() >= 2 { 2 } else { 1 };
            let upper = base.bump(kept).ok_or_else(|| overflow(rest))?;
            VersionRange::between(base, upper)
        } else {
            let rest = part.strip_prefix('=').unwrap_or(part);
            return Ok(VersionConstraint::Exact(version(rest)?));
        };

        Ok(VersionConstraint::from_range(range))
    }

    /// Normalize a range: unbounded becomes `Any`, a single point becomes `Exact`
    pub fn from_range(range: VersionRange) -> Self {
        match (&range.lower, &range.upper) {
            (None, None) => VersionConstraint::Any,
            (Some(lower), Some(upper))
                if lower.inclusive
                    && upper.inclusive
                    && lower.version.same_precedence(&upper.version) =>
            {
                VersionConstraint::Exact(lower.version.clone())
            },
            _ => VersionConstraint::Range(range),
        }
    }

    /// Constraint that only admits the given revision
    pub fn pinned(id: &VersionId) -> Self {
        match id {
            VersionId::Release(version) => VersionConstraint::Exact(version.clone()),
            VersionId::Ref(name) => VersionConstraint::Ref(name.clone()),
        }
    }

    /// Combine two constraints, `None` when their intersection is empty
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        use VersionConstraint::*;

        match (self, other) {
            (Any, x) | (x, Any) => Some(x.clone()),
            (Exact(a), Exact(b)) => a.same_precedence(b).then(|| Exact(a.clone())),
            (Exact(v), Range(r)) | (Range(r), Exact(v)) => {
                r.contains(v).then(|| Exact(v.clone()))
            },
            (Range(a), Range(b)) => a.intersect(b).map(VersionConstraint::from_range),
            (Ref(a), Ref(b)) => (a == b).then(|| Ref(a.clone())),
            (Ref(_), _) | (_, Ref(_)) => None,
        }
    }

    /// Intersect a whole sequence, returning `None` at the first empty step
    pub fn intersect_all<'a, I>(constraints: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a VersionConstraint>,
    {
        constraints
            .into_iter()
            .try_fold(VersionConstraint::Any, |acc, next| acc.intersect(next))
    }

    /// Check if a concrete revision satisfies this constraint
    pub fn matches(&self, id: &VersionId) -> bool {
        match (self, id) {
            (VersionConstraint::Any, _) => true,
            (VersionConstraint::Exact(pin), VersionId::Release(version)) => {
                pin.same_precedence(version)
            },
            (VersionConstraint::Range(range), VersionId::Release(version)) => range.contains(version),
            (VersionConstraint::Ref(name), VersionId::Ref(other)) => name == other,
            _ => false,
        }
    }

    /// The single revision an exact or reference constraint names
    pub fn as_pin(&self) -> Option<VersionId> {
        match self {
            VersionConstraint::Exact(version) => Some(VersionId::Release(version.clone())),
            VersionConstraint::Ref(name) => Some(VersionId::Ref(name.clone())),
            _ => None,
        }
    }

    /// Specificity rank: pins above bounded ranges above half-open ranges above `Any`
    pub fn specificity(&self) -> u8 {
        match self {
            VersionConstraint::Exact(_) | VersionConstraint::Ref(_) => 3,
            VersionConstraint::Range(range) if range.is_bounded() => 2,
            VersionConstraint::Range(_) => 1,
            VersionConstraint::Any => 0,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, VersionConstraint::Any)
    }
}

impl Default for VersionConstraint {
    fn default() -> Self {
        VersionConstraint::Any
    }
}

impl FromStr for VersionConstraint {
    type Err = DypsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionConstraint::parse(s)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => f.write_str("*"),
            VersionConstraint::Exact(version) => write!(f, "={}", version),
            VersionConstraint::Range(range) => write!(f, "{}", range),
            VersionConstraint::Ref(name) => write!(f, "@{}", name),
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(lower) = &self.lower {
            let op = if lower.inclusive { ">=" } else { ">" };
            parts.push(format!("{}{}", op, lower.version));
        }
        if let Some(upper) = &self.upper {
            let op = if upper.inclusive { "<=" } else { "<" };
            parts.push(format!("{}{}", op, upper.version));
        }
        if parts.is_empty() {
            return f.write_str("*");
        }
        f.write_str(&parts.join(", "))
    }
}

impl From<&VersionId> for VersionConstraint {
    fn from(id: &VersionId) -> Self {
        VersionConstraint::pinned(id)
    }
}

impl Serialize for VersionConstraint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionConstraint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        VersionConstraint::parse(&text).map_err(serde::de::Error::custom)
    }
}
