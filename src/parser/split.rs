use std::sync::LazyLock;

use regex::Regex;

use super::PipelineConfig;

/// Leading list label, including the combined "Ingredients/Ingrédients:" form.
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(ingredients|ingrédients)(\s*/\s*(ingredients|ingrédients))?[:\s]*")
        .unwrap()
});
static SECONDARY_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(ingrédients|contient)\s*:").unwrap());
static ASIDE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^()]*\)").unwrap());
static SLASH_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/[^,.\n]*").unwrap());

/// French leftovers that survive the cut and never name an ingredient.
const STOPWORDS: &[&str] = &[
    "et", "de", "du", "des", "le", "la", "les", "ou", "avec", "contient", "peut contenir",
];

/// Split extracted label text into ordered, trimmed, non-empty candidates.
pub fn split_ingredients(text: &str, config: &PipelineConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let unlabeled = LABEL_RE.replace(text, "");
    let body = if config.secondary_language_cut {
        cut_secondary_language(&unlabeled)
    } else {
        unlabeled.as_ref()
    };

    let mut clean = body.to_string();

    if config.strip_asides {
        while ASIDE_RE.is_match(&clean) {
            clean = ASIDE_RE.replace_all(&clean, " ").into_owned();
        }
        clean = SLASH_SUFFIX_RE.replace_all(&clean, "").into_owned();
    }

    clean
        .replace('\n', " ")
        .split([',', '.'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter(|item| !(config.stopword_filter && is_stopword(item)))
        .map(str::to_string)
        .collect()
}

/// Keep only what precedes a translated ingredient block. Runs after the
/// leading label is gone; a marker still at the very start is the label of
/// the list itself.
fn cut_secondary_language(text: &str) -> &str {
    let lead = text.len() - text.trim_start().len();
    SECONDARY_MARKER_RE
        .find_iter(text)
        .find(|m| m.start() > lead)
        .map(|m| &text[..m.start()])
        .unwrap_or(text)
}

fn is_stopword(item: &str) -> bool {
    let lower = item.to_lowercase();
    STOPWORDS.contains(&lower.as_str())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> Vec<String> {
        split_ingredients(text, &PipelineConfig::default())
    }

    fn split_plain(text: &str) -> Vec<String> {
        let config = PipelineConfig {
            secondary_language_cut: false,
            strip_asides: false,
            stopword_filter: false,
            ..PipelineConfig::default()
        };
        split_ingredients(text, &config)
    }

    #[test]
    fn empty_input() {
        assert!(split("").is_empty());
        assert!(split(" \n ").is_empty());
    }

    #[test]
    fn strips_label_and_splits_on_commas_and_periods() {
        assert_eq!(
            split("Ingredients: Coconut Milk, Sugar, Whey."),
            vec!["Coconut Milk", "Sugar", "Whey"]
        );
        assert_eq!(split("ingrédients sucre. sel"), vec!["sucre", "sel"]);
    }

    #[test]
    fn newlines_become_spaces() {
        assert_eq!(
            split("INGREDIENTS: WHOLE GRAIN\nOATS, SUGAR,\nSALT"),
            vec!["WHOLE GRAIN OATS", "SUGAR", "SALT"]
        );
    }

    #[test]
    fn label_only_stripped_at_start() {
        assert_eq!(split_plain("Made in Canada Ingredients: Rice"), vec!["Made in Canada Ingredients: Rice"]);
    }

    #[test]
    fn cuts_trailing_french_block() {
        assert_eq!(
            split("Ingredients: Water, Sugar. Ingrédients : Eau, sucre."),
            vec!["Water", "Sugar"]
        );
        assert_eq!(
            split("Ingredients: Wheat flour, Salt CONTIENT: blé"),
            vec!["Wheat flour", "Salt"]
        );
    }

    #[test]
    fn leading_french_label_is_not_a_cut() {
        assert_eq!(split("Ingrédients: Farine, sel"), vec!["Farine", "sel"]);
    }

    #[test]
    fn combined_bilingual_label_is_not_a_cut() {
        assert_eq!(
            split("Ingredients/Ingrédients: Water/Eau, Sugar/Sucre, Milk/Lait"),
            vec!["Water", "Sugar", "Milk"]
        );
        assert_eq!(
            split("INGREDIENTS / INGRÉDIENTS : Sugar/Sucre, Milk/Lait"),
            vec!["Sugar", "Milk"]
        );
        assert_eq!(
            split("Ingredients/Ingrédients: Sugar, Milk. Contient : lait"),
            vec!["Sugar", "Milk"]
        );
    }

    #[test]
    fn cut_disabled_keeps_french_block() {
        let config = PipelineConfig {
            secondary_language_cut: false,
            ..PipelineConfig::default()
        };
        let items = split_ingredients("Ingredients: Water. Ingrédients : Eau", &config);
        assert_eq!(items, vec!["Water", "Ingrédients : Eau"]);
    }

    #[test]
    fn strips_asides_and_slash_suffixes() {
        assert_eq!(
            split("Ingredients: Water/Eau, Salt (Sea salt (fine)), Sugar/Sucre"),
            vec!["Water", "Salt", "Sugar"]
        );
    }

    #[test]
    fn asides_kept_when_disabled() {
        assert_eq!(
            split_plain("Chocolate (sugar, milk)"),
            vec!["Chocolate (sugar", "milk)"]
        );
    }

    #[test]
    fn drops_french_stopwords() {
        assert_eq!(split("Sugar, et, Salt, DE, Peut contenir"), vec!["Sugar", "Salt"]);
        assert_eq!(split_plain("Sugar, et"), vec!["Sugar", "et"]);
    }

    #[test]
    fn splitting_own_output_is_stable() {
        for item in split("Ingredients: Enriched flour (wheat), Cane sugar, Sea salt.") {
            assert_eq!(split(&item), vec![item.clone()]);
        }
    }
}
