use std::cmp::Ordering;

/// Version used when a service is published for the first time without one.
pub const INITIAL_VERSION: &str = "1.0.0";

/// A version string ordered segment by segment.
///
/// Segments are split on `.`. Two numeric segments compare as numbers, two
/// non-numeric ones compare as text, and a numeric segment sorts before a
/// non-numeric one. When one version is a prefix of the other the shorter
/// sorts first. A leading `v` before a digit is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Numeric(&'a str),
    Text(&'a str),
}

impl<'a> Segment<'a> {
    fn parse(raw: &'a str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            Segment::Numeric(raw)
        } else {
            Segment::Text(raw)
        }
    }
}

impl Ord for Segment<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Numeric(a), Segment::Numeric(b)) => compare_digits(a, b),
            (Segment::Numeric(_), Segment::Text(_)) => Ordering::Less,
            (Segment::Text(_), Segment::Numeric(_)) => Ordering::Greater,
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Segment<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Digit strings of any length, without parsing into a fixed-width integer.
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl VersionToken {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn body(&self) -> &str {
        match self.0.strip_prefix(['v', 'V']) {
            Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
            _ => self.0.as_str(),
        }
    }

    fn segments(&self) -> impl Iterator<Item = Segment<'_>> {
        self.body().split('.').map(Segment::parse)
    }

    /// The next version after this one: the last numeric segment incremented,
    /// or `.1` appended when there is no numeric segment.
    pub fn successor(&self) -> VersionToken {
        let prefix = &self.0[..self.0.len() - self.body().len()];
        let parts: Vec<&str> = self.body().split('.').collect();
        let last_numeric = parts
            .iter()
            .rposition(|&part| matches!(Segment::parse(part), Segment::Numeric(_)));

        match last_numeric {
            Some(index) => {
                let mut bumped: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                bumped[index] = increment_digits(parts[index]);
                VersionToken(format!("{}{}", prefix, bumped.join(".")))
            }
            None => VersionToken(format!("{}.1", self.0)),
        }
    }

    /// Highest of the given versions.
    pub fn latest<'a, I>(versions: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        versions
            .into_iter()
            .max_by(|a, b| VersionToken::compare(a, b))
    }

    pub fn compare(a: &str, b: &str) -> Ordering {
        VersionToken::new(a).cmp(&VersionToken::new(b))
    }
}

fn increment_digits(digits: &str) -> String {
    let mut bytes: Vec<u8> = digits.bytes().collect();
    for byte in bytes.iter_mut().rev() {
        if *byte == b'9' {
            *byte = b'0';
        } else {
            *byte += 1;
            return String::from_utf8_lossy(&bytes).into_owned();
        }
    }
    format!("1{}", String::from_utf8_lossy(&bytes))
}

impl Ord for VersionToken {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left = self.segments();
        let mut right = other.segments();
        loop {
            match (left.next(), right.next()) {
                (None, None) => return self.0.cmp(&other.0),
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(a), Some(b)) => match a.cmp(&b) {
                    Ordering::Equal => continue,
                    unequal => return unequal,
                },
            }
        }
    }
}

impl PartialOrd for VersionToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<&str> for VersionToken {
    fn from(version: &str) -> Self {
        VersionToken::new(version)
    }
}
