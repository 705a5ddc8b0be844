use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

/// Major version at which GNOME moved from `3.x` to single-number releases.
pub const MODERN_SCHEME_THRESHOLD: u64 = 40;

const PRERELEASE_TAGS: [&str; 3] = ["alpha", "beta", "rc"];

static PRERELEASE_DOTTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+).(alpha|beta|rc)").expect("valid pre-release regex"));

static PRERELEASE_TILDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)~(alpha|beta|rc)").expect("valid pre-release regex"));

/// One lexical piece of a version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Numeric(&'a str),
    Alpha(&'a str),
    Tilde,
    Dash,
    Dot,
}

fn is_separator(c: char) -> bool {
    matches!(c, '.' | '-' | '~')
}

fn tokenize(version: &str) -> Vec<Segment<'_>> {
    let mut rest = version.trim_start_matches('0');
    let mut segments = Vec::new();

    while let Some(first) = rest.chars().next() {
        let (segment, len) = match first {
            '.' => (Segment::Dot, 1),
            '-' => (Segment::Dash, 1),
            '~' => (Segment::Tilde, 1),
            c if c.is_ascii_digit() => {
                let len = rest
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(rest.len());
                (Segment::Numeric(&rest[..len]), len)
            }
            _ => {
                let len = rest
                    .find(|c: char| c.is_ascii_digit() || is_separator(c))
                    .unwrap_or(rest.len());
                (Segment::Alpha(&rest[..len]), len)
            }
        };
        segments.push(segment);
        rest = &rest[len..];
    }

    segments
}

fn is_prerelease(tag: &str) -> bool {
    PRERELEASE_TAGS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(tag))
}

fn compare_numeric(a: &str, b: &str) -> Ordering {
    // zero-padded components keep rpm's textual ordering, e.g. 2.09 < 2.1
    if a.starts_with('0') || b.starts_with('0') {
        return a.cmp(b);
    }
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_alpha(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
}

/// `Equal` means the pair is not decisive and the next pair decides.
fn compare_segments(left: Segment<'_>, right: Segment<'_>) -> Ordering {
    use Segment::*;

    if left == right {
        return Ordering::Equal;
    }

    match (left, right) {
        (Tilde, _) => Ordering::Less,
        (_, Tilde) => Ordering::Greater,
        (Dash, _) => Ordering::Less,
        (_, Dash) => Ordering::Greater,
        (Dot, _) => Ordering::Less,
        (_, Dot) => Ordering::Greater,
        (Numeric(a), Numeric(b)) => compare_numeric(a, b),
        (Alpha(a), Numeric(_)) if is_prerelease(a) => Ordering::Less,
        (Numeric(_), Alpha(b)) if is_prerelease(b) => Ordering::Greater,
        (Alpha(_), Numeric(_)) | (Numeric(_), Alpha(_)) => Ordering::Equal,
        (Alpha(a), Alpha(b)) => compare_alpha(a, b),
    }
}

/// An upstream version together with the form used for ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCandidate {
    /// Version exactly as published upstream, e.g. `47.alpha`
    pub original: String,
    /// Pre-release markers rewritten as rpm tildes, e.g. `47~alpha`
    pub normalized: String,
}

impl VersionCandidate {
    pub fn new(version: &str) -> Self {
        Self {
            original: version.to_string(),
            normalized: to_tilde(version),
        }
    }
}

/// Rewrite `47.alpha` as `47~alpha` so it sorts before `47`.
pub fn to_tilde(version: &str) -> String {
    PRERELEASE_DOTTED.replace_all(version, "$1~$2").into_owned()
}

/// Inverse of [`to_tilde`], used for the upstream directory layout.
pub fn to_dotted(version: &str) -> String {
    PRERELEASE_TILDE.replace_all(version, "$1.$2").into_owned()
}

/// First dotted component as a number, if it is one.
pub fn leading_component(version: &str) -> Option<u64> {
    version.split('.').next()?.parse().ok()
}

/// Directory segment used on the GNOME mirror: `47` for modern releases,
/// `3.38` for the old scheme.
pub fn release_series(version: &str) -> String {
    let mut parts = version.split('.');
    let major = parts.next().unwrap_or_default();
    match (leading_component(version), parts.next()) {
        (Some(number), _) if number >= MODERN_SCHEME_THRESHOLD => major.to_string(),
        (_, Some(minor)) => format!("{major}.{minor}"),
        _ => major.to_string(),
    }
}

pub struct VersionComparator;

impl VersionComparator {
    /// Total order over version strings following rpm's `labelCompare` rules.
    pub fn compare(a: &str, b: &str) -> Ordering {
        let left = tokenize(a);
        let right = tokenize(b);
        let mut left_iter = left.iter().copied();
        let mut right_iter = right.iter().copied();

        loop {
            match (left_iter.next(), right_iter.next()) {
                (None, None) => return Ordering::Equal,
                (Some(Segment::Tilde), None) => return Ordering::Less,
                (None, Some(Segment::Tilde)) => return Ordering::Greater,
                (Some(_), None) => return Ordering::Greater,
                (None, Some(_)) => return Ordering::Less,
                (Some(l), Some(r)) => match compare_segments(l, r) {
                    Ordering::Equal => continue,
                    decisive => return decisive,
                },
            }
        }
    }

    /// Check if version `a` is newer than version `b`
    pub fn is_newer(a: &str, b: &str) -> bool {
        Self::compare(a, b) == Ordering::Greater
    }

    /// Highest candidate by normalized form; the first of equal-ranked entries wins.
    pub fn latest(candidates: &[VersionCandidate]) -> Option<&VersionCandidate> {
        candidates.iter().fold(None, |best, candidate| match best {
            Some(current) if !Self::is_newer(&candidate.normalized, &current.normalized) => {
                Some(current)
            }
            _ => Some(candidate),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[&str] = &[
        "1.0~alpha",
        "1.0~beta",
        "1.0~rc",
        "1.0",
        "1.0-1",
        "1.0.1",
        "1.1",
        "2.09",
        "2.1",
        "2.10",
        "3.3.92",
        "3.4.0",
        "007",
        "7",
        "10",
        "40~alpha",
        "40",
        "40.alpha",
        "40.0",
        "46.2",
        "47.0",
    ];

    #[test]
    fn documented_orderings() {
        assert_eq!(VersionComparator::compare("2.09", "2.1"), Ordering::Less);
        assert_eq!(
            VersionComparator::compare("3.4.0", "3.3.92"),
            Ordering::Greater
        );
        assert_eq!(VersionComparator::compare("1.0~alpha", "1.0"), Ordering::Less);
    }

    #[test]
    fn reflexive() {
        for v in SAMPLE {
            assert_eq!(VersionComparator::compare(v, v), Ordering::Equal, "{v}");
        }
    }

    #[test]
    fn antisymmetric_and_transitive() {
        for a in SAMPLE {
            for b in SAMPLE {
                let ab = VersionComparator::compare(a, b);
                assert_eq!(ab, VersionComparator::compare(b, a).reverse(), "{a} vs {b}");
                for c in SAMPLE {
                    let bc = VersionComparator::compare(b, c);
                    if ab == bc {
                        assert_eq!(VersionComparator::compare(a, c), ab, "{a} {b} {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn leading_zeros_are_stripped_once() {
        assert_eq!(VersionComparator::compare("007", "7"), Ordering::Equal);
        assert_eq!(VersionComparator::compare("1.05", "1.5"), Ordering::Less);
        assert_eq!(VersionComparator::compare("2.10", "2.9"), Ordering::Greater);
    }

    #[test]
    fn separators_sort_low() {
        assert_eq!(VersionComparator::compare("1.0-1", "1.0.1"), Ordering::Less);
        assert_eq!(VersionComparator::compare("1.0~rc", "1.0.1"), Ordering::Less);
        assert_eq!(VersionComparator::compare("48.1", "48"), Ordering::Greater);
    }

    #[test]
    fn prerelease_words_sort_below_numbers() {
        assert_eq!(VersionComparator::compare("40.alpha", "40.0"), Ordering::Less);
        assert_eq!(VersionComparator::compare("40.RC", "40.1"), Ordering::Less);
        assert_eq!(VersionComparator::compare("1.0~beta", "1.0~alpha"), Ordering::Greater);
    }

    #[test]
    fn other_words_against_numbers_are_not_decisive() {
        // "foo" vs "3" decides nothing; the following pair does
        assert_eq!(VersionComparator::compare("1.foo.2", "1.3.1"), Ordering::Greater);
        assert_eq!(VersionComparator::compare("1.foo", "1.3"), Ordering::Equal);
    }

    #[test]
    fn words_compare_case_insensitively() {
        assert_eq!(VersionComparator::compare("1.0a", "1.0B"), Ordering::Less);
        assert_eq!(VersionComparator::compare("1.0Beta", "1.0beta"), Ordering::Equal);
    }

    #[test]
    fn candidate_normalization() {
        let candidate = VersionCandidate::new("47.alpha");
        assert_eq!(candidate.normalized, "47~alpha");
        assert_eq!(to_dotted("47~rc"), "47.rc");
        assert_eq!(VersionCandidate::new("46.2").normalized, "46.2");
    }

    #[test]
    fn latest_prefers_release_over_prerelease() {
        let candidates: Vec<_> = ["47.rc", "46.3", "47.0", "47.beta"]
            .iter()
            .map(|v| VersionCandidate::new(v))
            .collect();
        let latest = VersionComparator::latest(&candidates).unwrap();
        assert_eq!(latest.original, "47.0");
    }

    #[test]
    fn latest_keeps_first_of_equal_candidates() {
        let equal: Vec<_> = ["1.0beta", "1.0BETA"]
            .iter()
            .map(|v| VersionCandidate::new(v))
            .collect();
        assert_eq!(VersionComparator::latest(&equal).unwrap().original, "1.0beta");
    }

    #[test]
    fn release_series_switches_at_forty() {
        assert_eq!(release_series("3.38.1"), "3.38");
        assert_eq!(release_series("40.1"), "40");
        assert_eq!(release_series("47.alpha"), "47");
        assert_eq!(leading_component("3.99.1"), Some(3));
        assert_eq!(leading_component("foo.1"), None);
    }
}
