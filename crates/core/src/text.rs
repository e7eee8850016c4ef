//! Text normalization shared by the classifier and the request extractor.

/// Lower-cases and strips Portuguese diacritics so `Amanhã` and `amanha` compare equal.
pub fn fold(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|character| match character {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// Folds the text and splits it into words, keeping `:` and `/` inside tokens
/// so `19:00` and `14/10` survive as single tokens.
pub fn words(text: &str) -> Vec<String> {
    let folded = fold(text);
    let mut sanitized = String::with_capacity(folded.len());
    for character in folded.chars() {
        if character.is_alphanumeric() || matches!(character, ':' | '/' | '-') {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized
        .split_whitespace()
        .map(|token| token.trim_matches(|c| matches!(c, ':' | '/' | '-')).to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

/// True when `phrase` (already folded, space separated) appears as a contiguous word run.
pub fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let needle = phrase.split_whitespace().collect::<Vec<_>>();
    if needle.is_empty() || needle.len() > words.len() {
        return false;
    }
    words.windows(needle.len()).any(|window| window.iter().zip(&needle).all(|(a, b)| a == b))
}

#[cfg(test)]
mod tests {
    use super::{contains_phrase, fold, words};

    #[test]
    fn folds_accents_and_case() {
        assert_eq!(fold("Amanhã às 19h, VÔLEI"), "amanha as 19h, volei");
    }

    #[test]
    fn keeps_clock_and_date_tokens_whole() {
        assert_eq!(words("Dia 14/10, às 19:00!"), vec!["dia", "14/10", "as", "19:00"]);
    }

    #[test]
    fn phrase_matching_respects_word_boundaries() {
        let tokens = words("boa noite, tudo bem?");
        assert!(contains_phrase(&tokens, "boa noite"));
        assert!(!contains_phrase(&tokens, "oi"));
    }
}
