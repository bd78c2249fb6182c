//! Rule set: destination directories, extension mappings, and binary signatures.
//!
//! A [`RuleSet`] is built once from plain configuration data and never changes
//! afterwards. Construction is forgiving: an extension that maps to an unknown
//! directory, or a signature pattern that does not compile, is dropped with a
//! warning and recorded as a [`RuleIssue`] instead of failing the whole set.
//!
//! # Examples
//!
//! ```
//! use dirsort::rules::RuleSet;
//!
//! let rules = RuleSet::new(
//!     ["Images", "Programming/Python"],
//!     [(" .PNG ", "Images"), ("py", "Programming/Python"), ("exe", "Binaries")],
//!     Some([("png", r"\x89PNG")]),
//! );
//!
//! assert_eq!(rules.directory_for_extension(".png"), Some("Images"));
//! assert_eq!(rules.directory_for_extension(".exe"), None);
//! assert!(rules.directory_names().contains("Misc"));
//! assert_eq!(rules.issues().len(), 1);
//! ```

use glob::Pattern;
use regex::bytes::{Regex, RegexBuilder};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Component, Path};

/// The catch-all destination for entries no rule claims.
pub const FALLBACK_DIR: &str = "Misc";

/// Number of leading bytes inspected when identifying extensionless files.
pub const SIGNATURE_READ_SIZE: usize = 32;

/// Platform housekeeping files that are never touched.
pub const RESERVED_IGNORE_NAMES: [&str; 2] = [".DS_Store", ".localized"];

/// Normalizes a file extension to lowercase with exactly one leading dot.
///
/// Surrounding whitespace and dots are stripped first. An extension with
/// nothing left after stripping normalizes to the empty string.
///
/// # Examples
///
/// ```
/// use dirsort::rules::normalize_extension;
///
/// assert_eq!(normalize_extension(" .JPEG "), ".jpeg");
/// assert_eq!(normalize_extension(" ...TAR.GZ "), ".tar.gz");
/// assert_eq!(normalize_extension(" .  "), "");
/// ```
pub fn normalize_extension(ext: &str) -> String {
    let stripped = ext.trim_matches(|c: char| c.is_whitespace() || c == '.');
    if stripped.is_empty() {
        String::new()
    } else {
        format!(".{}", stripped.to_lowercase())
    }
}

/// A rule that was dropped or adjusted during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleIssue {
    /// A destination directory name that is empty, absolute, or escapes the root.
    InvalidDirectory { name: String },
    /// An extension that normalized to nothing.
    EmptyExtension { raw: String },
    /// An extension rule pointing at a directory that was never declared.
    UnknownDirectory { extension: String, directory: String },
    /// An extension declared twice; the later rule wins.
    Reassigned {
        extension: String,
        previous: String,
        directory: String,
    },
    /// A signature for an extension that has no directory rule.
    SignatureWithoutRule { extension: String },
    /// A signature pattern that could not be unescaped or compiled.
    InvalidSignature {
        extension: String,
        pattern: String,
        reason: String,
    },
    /// An ignore glob that could not be parsed.
    InvalidIgnorePattern { pattern: String, reason: String },
}

impl fmt::Display for RuleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleIssue::InvalidDirectory { name } => {
                write!(f, "Directory '{}' is not a relative path, skipping", name)
            }
            RuleIssue::EmptyExtension { raw } => {
                write!(f, "Normalized '{}' is empty, skipping", raw)
            }
            RuleIssue::UnknownDirectory {
                extension,
                directory,
            } => write!(
                f,
                "'{}' maps to '{}' which is not a declared directory, skipping",
                extension, directory
            ),
            RuleIssue::Reassigned {
                extension,
                previous,
                directory,
            } => write!(
                f,
                "'{}' already points to '{}', updating to '{}'",
                extension, previous, directory
            ),
            RuleIssue::SignatureWithoutRule { extension } => {
                write!(f, "Signature for '{}' has no directory rule, skipping", extension)
            }
            RuleIssue::InvalidSignature {
                extension,
                pattern,
                reason,
            } => write!(
                f,
                "Invalid signature '{}' for '{}', skipping: {}",
                pattern, extension, reason
            ),
            RuleIssue::InvalidIgnorePattern { pattern, reason } => {
                write!(f, "Invalid ignore pattern '{}', skipping: {}", pattern, reason)
            }
        }
    }
}

/// All binary signatures compiled into one anchored alternation.
///
/// Each extension gets its own named group, so one scan of a file header tells
/// which signature matched.
#[derive(Debug, Clone)]
pub struct SignatureMatcher {
    regex: Regex,
    group_names: Vec<String>,
    name_to_extension: BTreeMap<String, String>,
}

impl SignatureMatcher {
    /// Compiles `(extension, raw pattern)` pairs.
    ///
    /// Returns the matcher (or `None` if nothing survived) together with the
    /// pairs that were rejected.
    fn compile<'a>(
        signatures: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> (Option<Self>, Vec<RuleIssue>) {
        let mut issues = Vec::new();
        let mut groups = Vec::new();
        let mut group_names = Vec::new();
        let mut name_to_extension = BTreeMap::new();

        for (extension, raw_pattern) in signatures {
            let name = unique_group_name(extension, &name_to_extension);
            let group = unescape_signature(raw_pattern)
                .and_then(|bytes| check_sub_pattern(&to_regex_source(&bytes)))
                .map(|source| format!("(?P<{}>(?:{}))", name, source))
                .and_then(|group| {
                    let mut growing = groups.clone();
                    growing.push(group.clone());
                    build_bytes_regex(&format!(r"\A(?:{})", growing.join("|"))).map(|_| group)
                });

            match group {
                Ok(group) => {
                    groups.push(group);
                    name_to_extension.insert(name.clone(), extension.to_string());
                    group_names.push(name);
                }
                Err(reason) => issues.push(RuleIssue::InvalidSignature {
                    extension: extension.to_string(),
                    pattern: raw_pattern.to_string(),
                    reason,
                }),
            }
        }

        if groups.is_empty() {
            return (None, issues);
        }

        let combined = format!(r"\A(?:{})", groups.join("|"));
        match build_bytes_regex(&combined) {
            Ok(regex) => (
                Some(Self {
                    regex,
                    group_names,
                    name_to_extension,
                }),
                issues,
            ),
            Err(reason) => {
                issues.push(RuleIssue::InvalidSignature {
                    extension: name_to_extension.values().cloned().collect::<Vec<_>>().join(","),
                    pattern: combined,
                    reason,
                });
                (None, issues)
            }
        }
    }

    /// Identifies a file header, returning the matched extension.
    ///
    /// Only a match starting at byte 0 counts.
    pub fn identify(&self, header: &[u8]) -> Option<&str> {
        let caps = self.regex.captures(header)?;
        self.group_names
            .iter()
            .find(|name| caps.name(name).is_some())
            .and_then(|name| self.name_to_extension.get(name))
            .map(String::as_str)
    }

    /// The combined pattern source.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Maps each group name back to the extension it identifies.
    pub fn name_to_extension(&self) -> &BTreeMap<String, String> {
        &self.name_to_extension
    }
}

/// Compiles one signature on its own and returns its source.
///
/// Named groups are reserved for the per-extension groups of the combined
/// matcher, so a signature may not declare its own.
fn check_sub_pattern(source: &str) -> Result<String, String> {
    let regex = build_bytes_regex(&format!("(?:{})", source))?;
    match regex.capture_names().flatten().next() {
        Some(name) => Err(format!("named group '{}' is not allowed in a signature", name)),
        None => Ok(source.to_string()),
    }
}

fn build_bytes_regex(source: &str) -> Result<Regex, String> {
    RegexBuilder::new(source)
        .unicode(false)
        .build()
        .map_err(|e| e.to_string())
}

fn unique_group_name(extension: &str, taken: &BTreeMap<String, String>) -> String {
    let base: String = format!("g_{}", extension)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if !taken.contains_key(&base) {
        return base;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !taken.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Turns a human-written escaped pattern into raw single-byte characters.
///
/// `\xNN`, octal, `\uXXXX` and the usual character escapes are decoded.
/// Unknown escapes stay as written so regex escapes such as `\.` survive.
/// Anything that does not fit in one byte is an error.
fn unescape_signature(raw: &str) -> Result<Vec<u8>, String> {
    let mut out: Vec<u32> = Vec::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c as u32);
            continue;
        }
        let Some(next) = chars.next() else {
            return Err("trailing backslash".to_string());
        };
        match next {
            'x' => out.push(take_hex(&mut chars, 2)?),
            'u' => out.push(take_hex(&mut chars, 4)?),
            'n' => out.push(0x0A),
            'r' => out.push(0x0D),
            't' => out.push(0x09),
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0C),
            'v' => out.push(0x0B),
            '\\' => out.push('\\' as u32),
            '\'' => out.push('\'' as u32),
            '"' => out.push('"' as u32),
            '0'..='7' => {
                let mut value = next.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(value);
            }
            other => {
                out.push('\\' as u32);
                out.push(other as u32);
            }
        }
    }

    out.into_iter()
        .map(|cp| {
            u8::try_from(cp)
                .map_err(|_| format!("character U+{:04X} does not fit in a single byte", cp))
        })
        .collect()
}

fn take_hex(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    digits: usize,
) -> Result<u32, String> {
    let mut value = 0u32;
    for _ in 0..digits {
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(16))
            .ok_or_else(|| format!("truncated escape, expected {} hex digits", digits))?;
        value = value * 16 + digit;
    }
    Ok(value)
}

/// Renders raw pattern bytes as regex source, escaping non-printable bytes.
fn to_regex_source(bytes: &[u8]) -> String {
    let mut source = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        if (0x20..=0x7E).contains(&b) {
            source.push(b as char);
        } else {
            source.push_str(&format!("\\x{:02X}", b));
        }
    }
    source
}

/// Names and globs for entries that are never touched.
#[derive(Debug, Clone)]
struct IgnoreRules {
    names: BTreeSet<String>,
    patterns: Vec<Pattern>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            names: RESERVED_IGNORE_NAMES.iter().map(|n| n.to_string()).collect(),
            patterns: Vec::new(),
        }
    }
}

/// The validated, immutable rule set driving classification.
#[derive(Debug, Clone)]
pub struct RuleSet {
    directory_names: BTreeSet<String>,
    extension_to_directory: BTreeMap<String, String>,
    signature_matcher: Option<SignatureMatcher>,
    ignore: IgnoreRules,
    issues: Vec<RuleIssue>,
}

impl RuleSet {
    /// Builds a rule set.
    ///
    /// * `directory_names` - destination directories, relative to the root
    /// * `extension_to_directory` - extension to one of those directories
    /// * `signatures` - optional extension to raw signature pattern
    ///
    /// The fallback directory is always part of the set. Rules that fail
    /// validation are dropped and reported through [`RuleSet::issues`].
    pub fn new<D, DN, E, EK, EV, S, SK, SV>(
        directory_names: D,
        extension_to_directory: E,
        signatures: Option<S>,
    ) -> Self
    where
        D: IntoIterator<Item = DN>,
        DN: AsRef<str>,
        E: IntoIterator<Item = (EK, EV)>,
        EK: AsRef<str>,
        EV: AsRef<str>,
        S: IntoIterator<Item = (SK, SV)>,
        SK: AsRef<str>,
        SV: AsRef<str>,
    {
        let mut issues = Vec::new();

        let mut dirs = BTreeSet::from([FALLBACK_DIR.to_string()]);
        for name in directory_names {
            let name = name.as_ref().trim().trim_end_matches('/');
            if is_relative_dir(name) {
                dirs.insert(name.to_string());
            } else {
                issues.push(RuleIssue::InvalidDirectory {
                    name: name.to_string(),
                });
            }
        }

        let mut ext_map: BTreeMap<String, String> = BTreeMap::new();
        for (raw, directory) in extension_to_directory {
            let (raw, directory) = (raw.as_ref(), directory.as_ref());
            let extension = normalize_extension(raw);
            if extension.is_empty() {
                issues.push(RuleIssue::EmptyExtension {
                    raw: raw.to_string(),
                });
                continue;
            }
            if !dirs.contains(directory) {
                issues.push(RuleIssue::UnknownDirectory {
                    extension,
                    directory: directory.to_string(),
                });
                continue;
            }
            if let Some(previous) = ext_map.insert(extension.clone(), directory.to_string())
                && previous != directory
            {
                issues.push(RuleIssue::Reassigned {
                    extension,
                    previous,
                    directory: directory.to_string(),
                });
            }
        }

        let signature_matcher = match signatures {
            Some(signatures) => {
                let mut accepted: Vec<(String, String)> = Vec::new();
                for (raw, pattern) in signatures {
                    let extension = normalize_extension(raw.as_ref());
                    if extension.is_empty() {
                        issues.push(RuleIssue::EmptyExtension {
                            raw: raw.as_ref().to_string(),
                        });
                    } else if !ext_map.contains_key(&extension) {
                        issues.push(RuleIssue::SignatureWithoutRule { extension });
                    } else {
                        accepted.push((extension, pattern.as_ref().to_string()));
                    }
                }
                let (matcher, compile_issues) = SignatureMatcher::compile(
                    accepted.iter().map(|(e, p)| (e.as_str(), p.as_str())),
                );
                issues.extend(compile_issues);
                if matcher.is_none() {
                    tracing::warn!(action = "INIT", "No valid binary signature patterns provided");
                }
                matcher
            }
            None => {
                tracing::info!(action = "INIT", "No binary signature patterns provided");
                None
            }
        };

        for issue in &issues {
            tracing::warn!(action = "INIT", "{}", issue);
        }

        Self {
            directory_names: dirs,
            extension_to_directory: ext_map,
            signature_matcher,
            ignore: IgnoreRules::default(),
            issues,
        }
    }

    /// Adds extra ignore names and glob patterns on top of the reserved names.
    pub fn with_ignore_rules<N, P>(mut self, names: N, patterns: P) -> Self
    where
        N: IntoIterator,
        N::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        self.ignore
            .names
            .extend(names.into_iter().map(|n| n.as_ref().to_string()));
        for raw in patterns {
            match Pattern::new(raw.as_ref()) {
                Ok(pattern) => self.ignore.patterns.push(pattern),
                Err(e) => {
                    let issue = RuleIssue::InvalidIgnorePattern {
                        pattern: raw.as_ref().to_string(),
                        reason: e.to_string(),
                    };
                    tracing::warn!(action = "INIT", "{}", issue);
                    self.issues.push(issue);
                }
            }
        }
        self
    }

    /// All destination directories, including the fallback.
    pub fn directory_names(&self) -> &BTreeSet<String> {
        &self.directory_names
    }

    /// The accepted extension rules, keyed by normalized extension.
    pub fn extension_to_directory(&self) -> &BTreeMap<String, String> {
        &self.extension_to_directory
    }

    /// Looks up the directory for an already-normalized extension.
    pub fn directory_for_extension(&self, extension: &str) -> Option<&str> {
        self.extension_to_directory
            .get(extension)
            .map(String::as_str)
    }

    pub fn signature_matcher(&self) -> Option<&SignatureMatcher> {
        self.signature_matcher.as_ref()
    }

    pub fn fallback_dir(&self) -> &str {
        FALLBACK_DIR
    }

    /// Rules that were dropped or adjusted during construction.
    pub fn issues(&self) -> &[RuleIssue] {
        &self.issues
    }

    /// Returns true if `name` is a root-level entry this organizer owns.
    ///
    /// For nested destinations such as `Images/Raw`, the top-level `Images`
    /// counts as managed too.
    pub fn is_managed_directory(&self, name: &str) -> bool {
        self.directory_names.iter().any(|dir| {
            dir == name || Path::new(dir).components().next() == Some(Component::Normal(name.as_ref()))
        })
    }

    /// Returns true if an entry with this name must never be touched.
    pub fn is_ignored_name(&self, name: &str) -> bool {
        self.ignore.names.contains(name) || self.ignore.patterns.iter().any(|p| p.matches(name))
    }
}

fn is_relative_dir(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_SIGNATURES: Option<[(&str, &str); 0]> = None;

    fn rules_with_signatures(signatures: &[(&str, &str)]) -> RuleSet {
        RuleSet::new(
            ["Images", "Archives", "Programming/Python", "Programming/Shell"],
            [
                ("png", "Images"),
                ("zip", "Archives"),
                ("py", "Programming/Python"),
                ("sh", "Programming/Shell"),
            ],
            Some(signatures.iter().copied()),
        )
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(""), "");
        assert_eq!(normalize_extension(" .  "), "");
        assert_eq!(normalize_extension("png"), ".png");
        assert_eq!(normalize_extension("..PNG."), ".png");
        assert_eq!(normalize_extension("\t.Tar.Gz\n"), ".tar.gz");
    }

    #[test]
    fn test_normalize_extension_is_idempotent() {
        for raw in ["", " . ", "JPG", "...tar.gz", " .a.b. ", ".", "x"] {
            let once = normalize_extension(raw);
            assert_eq!(normalize_extension(&once), once);
            assert!(once.is_empty() || (once.starts_with('.') && !once.starts_with("..")));
        }
    }

    #[test]
    fn test_fallback_always_present() {
        let rules = RuleSet::new(Vec::<String>::new(), Vec::<(String, String)>::new(), NO_SIGNATURES);
        assert!(rules.directory_names().contains(FALLBACK_DIR));
        assert_eq!(rules.fallback_dir(), "Misc");
    }

    #[test]
    fn test_unknown_directory_rule_dropped() {
        let rules = RuleSet::new(
            ["Images"],
            [("png", "Images"), ("exe", "Programs"), (" . ", "Images")],
            NO_SIGNATURES,
        );

        assert_eq!(rules.extension_to_directory().len(), 1);
        for dir in rules.extension_to_directory().values() {
            assert!(rules.directory_names().contains(dir));
        }
        assert!(rules.issues().contains(&RuleIssue::UnknownDirectory {
            extension: ".exe".into(),
            directory: "Programs".into(),
        }));
        assert!(rules.issues().contains(&RuleIssue::EmptyExtension { raw: " . ".into() }));
    }

    #[test]
    fn test_reassigned_extension_keeps_last() {
        let rules = RuleSet::new(
            ["Images", "Photos"],
            [("PNG", "Images"), (".png", "Photos")],
            NO_SIGNATURES,
        );
        assert_eq!(rules.directory_for_extension(".png"), Some("Photos"));
        assert!(matches!(rules.issues()[0], RuleIssue::Reassigned { .. }));
    }

    #[test]
    fn test_invalid_directory_names_rejected() {
        let rules = RuleSet::new(
            ["/etc", "../outside", "", "Images/Raw/"],
            [("dng", "Images/Raw")],
            NO_SIGNATURES,
        );
        assert!(rules.directory_names().contains("Images/Raw"));
        assert!(!rules.directory_names().contains("/etc"));
        assert_eq!(
            rules
                .issues()
                .iter()
                .filter(|i| matches!(i, RuleIssue::InvalidDirectory { .. }))
                .count(),
            3
        );
    }

    #[test]
    fn test_signature_compiles_into_named_groups() {
        let rules = rules_with_signatures(&[(" .PNG ", r"\x89PNG"), ("...ZIP  ", r"PK\x03\x04")]);
        let matcher = rules.signature_matcher().expect("matcher");

        assert_eq!(
            matcher.pattern(),
            r"\A(?:(?P<g__png>(?:\x89PNG))|(?P<g__zip>(?:PK\x03\x04)))"
        );
        assert_eq!(matcher.name_to_extension()["g__png"], ".png");
        assert_eq!(matcher.name_to_extension()["g__zip"], ".zip");
    }

    #[test]
    fn test_signature_without_rule_dropped() {
        let rules = rules_with_signatures(&[("pdf", "%PDF")]);
        assert!(rules.signature_matcher().is_none());
        assert_eq!(
            rules.issues(),
            &[RuleIssue::SignatureWithoutRule {
                extension: ".pdf".into()
            }]
        );
    }

    #[test]
    fn test_invalid_signature_only_drops_itself() {
        let rules = rules_with_signatures(&[("png", r"\x89PNG"), ("zip", "PK(unclosed"), ("sh", "\u{263A}")]);
        let matcher = rules.signature_matcher().expect("matcher");

        assert_eq!(matcher.name_to_extension().len(), 1);
        assert_eq!(
            rules
                .issues()
                .iter()
                .filter(|i| matches!(i, RuleIssue::InvalidSignature { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_identify_is_anchored() {
        let rules = rules_with_signatures(&[
            ("png", r"\x89PNG"),
            ("py", "#!/.+?python"),
            ("sh", "#!/.+?sh"),
            ("zip", r"PK\x03\x04"),
        ]);
        let matcher = rules.signature_matcher().expect("matcher");

        assert_eq!(matcher.identify(b"\x89PNG\r\n\x1a\n"), Some(".png"));
        assert_eq!(matcher.identify(b"#!/usr/bin/env python3\n"), Some(".py"));
        assert_eq!(matcher.identify(b"#!/usr/bin/env -S bash\n"), Some(".sh"));
        assert_eq!(matcher.identify(b"PK\x03\x04\x14\x00"), Some(".zip"));
        assert_eq!(matcher.identify(b"xx\x89PNG"), None);
        assert_eq!(matcher.identify(b"Some unknown file"), None);
    }

    #[test]
    fn test_signature_with_named_group_only_drops_itself() {
        for signatures in [
            [("png", r"\x89PNG"), ("zip", r"(?P<g__png>PK\x03\x04)")],
            [("zip", r"(?P<g__png>PK\x03\x04)"), ("png", r"\x89PNG")],
        ] {
            let rules = rules_with_signatures(&signatures);
            let matcher = rules.signature_matcher().expect("matcher");

            assert_eq!(matcher.identify(b"\x89PNG\r\n"), Some(".png"));
            assert_eq!(matcher.identify(b"PK\x03\x04"), None);
            assert!(rules.issues().iter().any(|issue| matches!(
                issue,
                RuleIssue::InvalidSignature { extension, .. } if extension == ".zip"
            )));
        }
    }

    #[test]
    fn test_signature_with_plain_group_kept() {
        let rules = rules_with_signatures(&[("zip", r"(PK)\x03\x04"), ("png", r"\x89PNG")]);
        let matcher = rules.signature_matcher().expect("matcher");

        assert_eq!(matcher.identify(b"PK\x03\x04\x14"), Some(".zip"));
        assert_eq!(matcher.identify(b"\x89PNG"), Some(".png"));
        assert!(rules.issues().is_empty());
    }

    #[test]
    fn test_unescape_signature() {
        assert_eq!(unescape_signature(r"\x89PNG").unwrap(), b"\x89PNG");
        assert_eq!(unescape_signature(r"\\x").unwrap(), b"\\x");
        assert_eq!(unescape_signature(r"a\.b").unwrap(), b"a\\.b");
        assert_eq!(unescape_signature(r"\101\0").unwrap(), b"A\x00");
        assert_eq!(unescape_signature(r"ÿ").unwrap(), b"\xff");
        assert!(unescape_signature(r"Ā").is_err());
        assert!(unescape_signature(r"\x8").is_err());
        assert!(unescape_signature("\\").is_err());
    }

    #[test]
    fn test_to_regex_source_escapes_raw_bytes() {
        assert_eq!(to_regex_source(b"\x89PNG\r\n"), r"\x89PNG\x0D\x0A");
        assert_eq!(to_regex_source(b"#!/.+?sh"), "#!/.+?sh");
    }

    #[test]
    fn test_group_name_collisions_disambiguated() {
        let mut taken = BTreeMap::new();
        taken.insert("g__tar_gz".to_string(), ".tar.gz".to_string());
        assert_eq!(unique_group_name(".tar-gz", &taken), "g__tar_gz_1");
    }

    #[test]
    fn test_managed_directory_includes_parents() {
        let rules = RuleSet::new(["Programming/Python"], [("py", "Programming/Python")], NO_SIGNATURES);
        assert!(rules.is_managed_directory("Programming"));
        assert!(rules.is_managed_directory("Programming/Python"));
        assert!(rules.is_managed_directory("Misc"));
        assert!(!rules.is_managed_directory("Python"));
    }

    #[test]
    fn test_ignore_rules() {
        let rules = RuleSet::new(["Images"], [("png", "Images")], NO_SIGNATURES)
            .with_ignore_rules(["Thumbs.db"], ["*.crdownload", "[bad"]);

        assert!(rules.is_ignored_name(".DS_Store"));
        assert!(rules.is_ignored_name("Thumbs.db"));
        assert!(rules.is_ignored_name("movie.mkv.crdownload"));
        assert!(!rules.is_ignored_name("movie.mkv"));
        assert!(matches!(
            rules.issues().last(),
            Some(RuleIssue::InvalidIgnorePattern { .. })
        ));
    }
}
