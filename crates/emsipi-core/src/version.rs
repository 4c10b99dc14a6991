//! Concrete Python version selection from a `requires-python` specifier.
//!
//! The candidate universe enumerates every `major.minor.micro` release from
//! 2.0.0 up to the 3.15 line, bounded by a fixed table of per-minor micro
//! ceilings. Selection walks the universe in ascending order and returns the
//! *smallest* stable release the specifier admits, which maximises base image
//! availability.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use crate::error::Error;

/// Default Python version when detection yields nothing.
pub const DEFAULT_PYTHON_VERSION: &str = "3.11";

/// Highest micro release per `(major, minor)` line. Lines absent from the
/// table only have a `.0` release in the universe.
const MICRO_CEILINGS: &[((u32, u32), u32)] = &[
    ((2, 7), 18),
    ((3, 0), 1),
    ((3, 1), 5),
    ((3, 2), 6),
    ((3, 3), 7),
    ((3, 4), 10),
    ((3, 5), 10),
    ((3, 6), 15),
    ((3, 7), 17),
    ((3, 8), 20),
    ((3, 9), 23),
    ((3, 10), 18),
    ((3, 11), 13),
    ((3, 12), 11),
    ((3, 13), 20),
    ((3, 14), 20),
    ((3, 15), 20),
];

static CANDIDATES: LazyLock<Vec<Version>> = LazyLock::new(|| {
    let mut versions = Vec::new();
    for major in 2..=3 {
        let max_minor = if major == 2 { 7 } else { 15 };
        for minor in 0..=max_minor {
            let ceiling = MICRO_CEILINGS
                .iter()
                .find(|(line, _)| *line == (major, minor))
                .map_or(0, |(_, micro)| *micro);
            versions.extend((0..=ceiling).map(|micro| Version::new(major, minor, micro)));
        }
    }
    versions
});

/// The built-in ascending candidate universe.
pub fn candidates() -> &'static [Version] {
    &CANDIDATES
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreRelease {
    Alpha(u32),
    Beta(u32),
    Rc(u32),
}

/// A release version: dotted numeric segments plus an optional pre-release tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    release: Vec<u32>,
    pre: Option<PreRelease>,
}

impl Version {
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            release: vec![major, minor, micro],
            pre: None,
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim().trim_start_matches('v');
        let split = input
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(input.len());
        let (numeric, tag) = input.split_at(split);
        let release = numeric
            .split('.')
            // arch-lint: allow(no-silent-result-drop) reason="a non-numeric segment means the text is not a version; callers report that"
            .map(|seg| seg.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()?;
        if release.is_empty() {
            return None;
        }
        let pre = if tag.is_empty() {
            None
        } else {
            Some(parse_pre(tag)?)
        };
        Some(Self { release, pre })
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    pub fn release(&self) -> &[u32] {
        &self.release
    }

    fn segment(&self, i: usize) -> u32 {
        self.release.get(i).copied().unwrap_or(0)
    }

    fn cmp_release(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        (0..len)
            .map(|i| self.segment(i).cmp(&other.segment(i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    fn starts_with(&self, prefix: &[u32]) -> bool {
        prefix.iter().enumerate().all(|(i, seg)| self.segment(i) == *seg)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_release(other).then_with(|| match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let release: Vec<String> = self.release.iter().map(u32::to_string).collect();
        f.write_str(&release.join("."))?;
        match self.pre {
            Some(PreRelease::Alpha(n)) => write!(f, "a{n}"),
            Some(PreRelease::Beta(n)) => write!(f, "b{n}"),
            Some(PreRelease::Rc(n)) => write!(f, "rc{n}"),
            None => Ok(()),
        }
    }
}

fn parse_pre(tag: &str) -> Option<PreRelease> {
    let (kind, num) = tag.split_at(tag.find(|c: char| c.is_ascii_digit()).unwrap_or(tag.len()));
    let n = if num.is_empty() {
        0
    } else {
        // arch-lint: allow(no-silent-result-drop) reason="an unparsable pre-release number rejects the whole version"
        num.parse().ok()?
    };
    match kind {
        "a" | "alpha" => Some(PreRelease::Alpha(n)),
        "b" | "beta" => Some(PreRelease::Beta(n)),
        "rc" | "c" => Some(PreRelease::Rc(n)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Compatible,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Less,
    Greater,
    Arbitrary,
}

#[derive(Debug, Clone)]
struct Clause {
    op: Operator,
    version: Version,
    /// `==3.8.*` / `!=3.8.*`
    wildcard: bool,
    raw: String,
}

impl Clause {
    fn contains(&self, candidate: &Version) -> bool {
        match self.op {
            Operator::Equal if self.wildcard => candidate.starts_with(&self.version.release),
            Operator::NotEqual if self.wildcard => !candidate.starts_with(&self.version.release),
            Operator::Equal => candidate == &self.version || candidate.cmp(&self.version).is_eq(),
            Operator::NotEqual => candidate.cmp(&self.version).is_ne(),
            Operator::LessEqual => candidate <= &self.version,
            Operator::GreaterEqual => candidate >= &self.version,
            Operator::Less => candidate < &self.version,
            Operator::Greater => candidate > &self.version,
            Operator::Compatible => {
                let prefix_len = self.version.release.len().saturating_sub(1);
                let prefix = self.version.release.get(..prefix_len).unwrap_or_default();
                candidate >= &self.version && candidate.starts_with(prefix)
            }
            Operator::Arbitrary => candidate.to_string() == self.raw,
        }
    }
}

/// A parsed comma-separated specifier set such as `>=3.8,<3.10`.
#[derive(Debug, Clone)]
pub struct SpecifierSet {
    clauses: Vec<Clause>,
}

impl SpecifierSet {
    pub fn parse(specifier: &str) -> crate::Result<Self> {
        let clauses = specifier
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| parse_clause(specifier, c))
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(Self { clauses })
    }

    pub fn contains(&self, candidate: &Version) -> bool {
        self.clauses.iter().all(|c| c.contains(candidate))
    }
}

fn parse_clause(specifier: &str, clause: &str) -> crate::Result<Clause> {
    const OPERATORS: &[(&str, Operator)] = &[
        ("===", Operator::Arbitrary),
        ("~=", Operator::Compatible),
        ("==", Operator::Equal),
        ("!=", Operator::NotEqual),
        ("<=", Operator::LessEqual),
        (">=", Operator::GreaterEqual),
        ("<", Operator::Less),
        (">", Operator::Greater),
    ];
    let invalid = |reason: String| Error::InvalidVersionSpecifier {
        specifier: specifier.to_owned(),
        reason,
    };

    let (op, rest) = OPERATORS
        .iter()
        .find_map(|(token, op)| clause.strip_prefix(token).map(|rest| (*op, rest.trim())))
        .ok_or_else(|| invalid(format!("'{clause}' has no comparison operator")))?;

    let (text, wildcard) = match rest.strip_suffix(".*") {
        Some(prefix) => (prefix, true),
        None => (rest, false),
    };
    if wildcard && !matches!(op, Operator::Equal | Operator::NotEqual) {
        return Err(invalid(format!("wildcard not allowed with '{clause}'")));
    }
    let version = Version::parse(text).ok_or_else(|| invalid(format!("'{text}' is not a version")))?;
    if op == Operator::Compatible && version.release.len() < 2 {
        return Err(invalid(format!("'{clause}' needs at least two release segments")));
    }

    Ok(Clause {
        op,
        version,
        wildcard,
        raw: rest.to_owned(),
    })
}

/// First (numerically smallest) stable candidate admitted by `specifier`.
pub fn resolve_version(specifier: &str, universe: &[Version]) -> crate::Result<Option<Version>> {
    let set = SpecifierSet::parse(specifier)?;
    Ok(universe
        .iter()
        .filter(|v| !v.is_prerelease())
        .find(|v| set.contains(v))
        .cloned())
}
