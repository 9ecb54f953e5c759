/// One submission prepared in the three shapes the rules match against.
#[derive(Debug, Clone)]
pub struct ScanInput<'a> {
    /// Text as submitted. URL and company rules need its spacing and punctuation.
    pub raw: &'a str,
    /// Lowercased with accented vowels folded to ASCII; spacing kept.
    pub folded: String,
    /// `folded` with whitespace, hyphens, underscores, dots and parentheses removed.
    pub normalized: String,
}

impl<'a> ScanInput<'a> {
    pub fn new(raw: &'a str) -> Self {
        let folded: String = raw.to_lowercase().chars().map(fold_vowel).collect();
        let normalized = folded
            .chars()
            .filter(|c| !is_separator(*c))
            .collect();

        Self {
            raw,
            folded,
            normalized,
        }
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '_' | '.' | '(' | ')')
}

fn fold_vowel(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        other => other,
    }
}
