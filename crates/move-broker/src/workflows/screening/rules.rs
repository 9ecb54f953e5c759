use once_cell::sync::Lazy;
use regex::Regex;

use super::normalize::ScanInput;
use super::ContactViolation;

/// Detection rule: inspects a prepared submission and reports at most one category.
pub type ScanRule = fn(&ScanInput<'_>) -> Option<ContactViolation>;

/// Ordered rule list used by the standard scanner.
pub(crate) const STANDARD_RULES: &[(&str, ScanRule)] = &[
    ("phone_number", phone_number),
    ("email_address", email_address),
    ("web_link", web_link),
    ("digit_sequence", digit_sequence),
    ("circumvention_keywords", circumvention_keywords),
    ("company_name", company_name),
];

const NUMBER_WORDS: &str = "zero|un|deux|trois|quatre|cinq|six|sept|huit|neuf";
const MIN_SEQUENCE_DIGITS: usize = 8;
const MIN_CIRCUMVENTION_KEYWORDS: usize = 2;

const CIRCUMVENTION_KEYWORDS: &[&str] = &[
    "appelez",
    "appelle",
    "appellez",
    "contactez",
    "contacter",
    "ecrivez",
    "ecris",
    "ecrire",
    "mail",
    "email",
    "whatsapp",
    "signal",
    "telegram",
    "messenger",
    "facebook",
    "instagram",
    "snapchat",
    "twitter",
    "linkedin",
    "directement",
    "endirect",
    "horsplateforme",
    "sanscommission",
    "callme",
    "offplatform",
    "nocommission",
];

// Matched against the normalized text, which has no dots or parentheses left;
// `(at)` and `x.y` shapes are covered by EMAIL_PATTERNS on the raw text.
const AT_VARIANTS: &[&str] = &["@", "arobase", "at", "[at]", "arroba"];
const DOT_VARIANTS: &[&str] = &["point", "dot", "[dot]"];

static SPELLED_DIGITS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:{w})[\s\-]{{0,2}}(?:{w})[\s\-]{{0,2}}(?:{w})",
        w = NUMBER_WORDS
    ))
    .expect("valid regex")
});

static PHONE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b0[1-9][\s\-.]{0,2}(?:\d[\s\-.]{0,2}){8}\b",
        r"\b\+?\d{1,3}[\s\-.]{0,2}(?:\d[\s\-.]{0,2}){8,12}\b",
        r"\b0[1-9]\d{8}\b",
        r"(?i)(?:telephone|tel|phone|portable|mobile|contact|appel|whatsapp|signal|telegram)[\s:]*(?:\+?\d[\d\s\-.()]{8,}|\d{10})",
    ])
});

static EMAIL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)[a-z0-9._%+\-]+\s*@\s*[a-z0-9.\-]+\.[a-z]{2,}",
        r"(?i)[a-z0-9._%+\-]+\s*\[at\]\s*[a-z0-9.\-]+\s*\[dot\]\s*[a-z]{2,}",
        r"(?i)[a-z0-9._%+\-]+\s*\(at\)\s*[a-z0-9.\-]+\s*\(dot\)\s*[a-z]{2,}",
        r"(?i)[a-z0-9._%+\-]+\s*arobase\s*[a-z0-9.\-]+\s*point\s*[a-z]{2,}",
        r"(?i)\b[a-z0-9._%+\-]+\s*@\s*[a-z0-9.\-]+\s*\.\s*(?:com|fr|net|org|eu)\b",
    ])
});

static URL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)(?:https?://|www\.)[a-z0-9\-._\~:/?#\[\]@!$\&'()*+,;=%]+",
        r"(?i)\b[a-z0-9\-]+\s*\.\s*(?:com|fr|net|org|eu|co|io)\b",
        r"(?i)\b(?:site|web|lien|link|url)\b[\s:]+[a-z0-9\-_\~]+(?:[./][a-z0-9\-_\~]+)+",
    ])
});

static DIGIT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d(?:[\s\-._]{0,2}\d)+").expect("valid regex"));

static COMPANY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)demenagement\s+[a-z]+",
        r"(?i)[a-z]+\s+demenagement",
        r"(?i)\b(?:sarl|sas|eurl|auto-entrepreneur)\b",
        r"(?i)\b(?:siret|siren)\b",
    ])
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).expect("valid regex"))
        .collect()
}

fn any_match(patterns: &[Regex], haystacks: &[&str]) -> bool {
    patterns
        .iter()
        .any(|pattern| haystacks.iter().any(|text| pattern.is_match(text)))
}

fn phone_number(input: &ScanInput<'_>) -> Option<ContactViolation> {
    let haystacks = [input.raw, input.folded.as_str(), input.normalized.as_str()];
    let spelled = haystacks.iter().any(|text| SPELLED_DIGITS.is_match(text));

    (spelled || any_match(&PHONE_PATTERNS, &haystacks)).then_some(ContactViolation::PhoneNumber)
}

/// Full address shapes, or any at-variant together with any dot-variant.
fn email_address(input: &ScanInput<'_>) -> Option<ContactViolation> {
    let shaped = any_match(&EMAIL_PATTERNS, &[input.raw, input.normalized.as_str()]);
    let normalized = input.normalized.as_str();
    let obfuscated = AT_VARIANTS.iter().any(|at| normalized.contains(at))
        && DOT_VARIANTS.iter().any(|dot| normalized.contains(dot));

    (shaped || obfuscated).then_some(ContactViolation::EmailAddress)
}

fn web_link(input: &ScanInput<'_>) -> Option<ContactViolation> {
    any_match(&URL_PATTERNS, &[input.raw]).then_some(ContactViolation::WebLink)
}

fn digit_sequence(input: &ScanInput<'_>) -> Option<ContactViolation> {
    let long_run = DIGIT_RUN.find_iter(input.raw).any(|run| {
        run.as_str().chars().filter(char::is_ascii_digit).count() >= MIN_SEQUENCE_DIGITS
    });

    (long_run || SPELLED_DIGITS.is_match(&input.folded)).then_some(ContactViolation::DigitSequence)
}

fn circumvention_keywords(input: &ScanInput<'_>) -> Option<ContactViolation> {
    (distinct_keywords(&input.normalized) >= MIN_CIRCUMVENTION_KEYWORDS)
        .then_some(ContactViolation::CircumventionAttempt)
}

fn company_name(input: &ScanInput<'_>) -> Option<ContactViolation> {
    any_match(&COMPANY_PATTERNS, &[input.raw]).then_some(ContactViolation::CompanyName)
}

/// Number of list entries found in the text. Overlapping entries each count, so
/// `email` also counts as `mail`.
fn distinct_keywords(normalized: &str) -> usize {
    CIRCUMVENTION_KEYWORDS
        .iter()
        .filter(|keyword| normalized.contains(*keyword))
        .count()
}
