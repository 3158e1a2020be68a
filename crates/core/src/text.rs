//! Input normalization shared by the conversation handlers.

/// Lowercased, accent-folded, trimmed form of `text`, used only for comparisons.
/// Free-text captures keep the original casing.
pub fn comparison_key(text: &str) -> String {
    text.trim().chars().flat_map(char::to_lowercase).map(fold_accent).collect()
}

/// Strips everything but ASCII digits.
pub fn digits_only(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        other => other,
    }
}
