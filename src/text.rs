// 🔤 Text Normalization - diacritic-insensitive matching
// Every pattern in the extractor runs against the output of `normalize`,
// so "terça", "Terca" and "TERÇA" all look the same to the matchers.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercase and strip combining marks (NFD decomposition, then drop U+0300..U+036F and friends)
///
/// "Depois de Amanhã às 19h" → "depois de amanha as 19h"
pub fn normalize(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalize and trim, used for vocabulary lookups ("Mês " → "mes")
pub fn normalize_token(token: &str) -> String {
    normalize(token.trim())
}
