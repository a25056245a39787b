//! Post-fetch transforms. Each one reads the raw pipeline payloads it needs
//! out of the property map and returns the context its templates expect.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use super::registry::Context;

/// Number of words listed in the statistics "most common" table.
const MOST_COMMON_LIMIT: usize = 20;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("missing property {0:?}")]
    MissingField(&'static str),
    #[error("malformed property {field:?}: {reason}")]
    Malformed { field: &'static str, reason: String },
}

fn take<T: DeserializeOwned>(context: &mut Context, field: &'static str) -> Result<T, TransformError> {
    let value = context
        .remove(field)
        .ok_or(TransformError::MissingField(field))?;
    serde_json::from_value(value).map_err(|e| TransformError::Malformed {
        field,
        reason: e.to_string(),
    })
}

fn into_context<T: Serialize>(output: T) -> Context {
    match serde_json::to_value(output) {
        Ok(Value::Object(map)) => map,
        _ => Context::new(),
    }
}

// ──────────────────────────── Part of speech ────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PosCategory {
    Noun,
    ProperNoun,
    Verb,
    Adjective,
    Adverb,
    Pronoun,
    Determiner,
    Preposition,
    Conjunction,
    Numeral,
    Interjection,
    Punctuation,
    Other,
}

impl PosCategory {
    /// Map a Penn Treebank or Mac-Morpho tag to its coarse category.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "NNP" | "NNPS" | "NPROP" => Self::ProperNoun,
            t if t.starts_with("NN") || t == "N" => Self::Noun,
            "MD" | "V" | "VAUX" | "PCP" => Self::Verb,
            t if t.starts_with("VB") => Self::Verb,
            t if t.starts_with("JJ") || t == "ADJ" => Self::Adjective,
            t if t.starts_with("RB") || t == "WRB" || t == "ADV" => Self::Adverb,
            t if t.starts_with("PRP") || t.starts_with("WP") || t.starts_with("PRO") => {
                Self::Pronoun
            }
            "DT" | "PDT" | "WDT" | "ART" => Self::Determiner,
            "IN" | "TO" | "PREP" => Self::Preposition,
            "CC" | "KC" | "KS" => Self::Conjunction,
            "CD" | "NUM" => Self::Numeral,
            "UH" => Self::Interjection,
            "." | "," | ":" | "(" | ")" | "``" | "''" | "#" | "$" | "-LRB-" | "-RRB-" => {
                Self::Punctuation
            }
            _ => Self::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Noun => "Noun",
            Self::ProperNoun => "Proper noun",
            Self::Verb => "Verb",
            Self::Adjective => "Adjective",
            Self::Adverb => "Adverb",
            Self::Pronoun => "Pronoun",
            Self::Determiner => "Determiner",
            Self::Preposition => "Preposition",
            Self::Conjunction => "Conjunction",
            Self::Numeral => "Numeral",
            Self::Interjection => "Interjection",
            Self::Punctuation => "Punctuation",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Serialize)]
struct HighlightedToken {
    token: String,
    tag: String,
    category: PosCategory,
    label: &'static str,
}

#[derive(Debug, Serialize)]
struct LegendEntry {
    category: PosCategory,
    label: &'static str,
    count: usize,
}

#[derive(Debug, Serialize)]
struct PosHighlight {
    highlighted: Vec<HighlightedToken>,
    legend: Vec<LegendEntry>,
    token_count: usize,
}

/// `pos` is a list of `[token, tag]` or `[token, tag, offset]` entries.
fn parse_pos(entries: Vec<Vec<Value>>) -> Result<Vec<(String, String)>, TransformError> {
    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| match entry.as_slice() {
            [Value::String(token), Value::String(tag), ..] => Ok((token.clone(), tag.clone())),
            _ => Err(TransformError::Malformed {
                field: "pos",
                reason: format!("entry {i} is not a [token, tag, ...] list"),
            }),
        })
        .collect()
}

pub fn pos_highlighter(mut context: Context) -> Result<Context, TransformError> {
    let pos = parse_pos(take(&mut context, "pos")?)?;
    let tokens: Vec<String> = take(&mut context, "tokens")?;

    let mut counts: HashMap<PosCategory, usize> = HashMap::new();
    let highlighted: Vec<HighlightedToken> = pos
        .into_iter()
        .map(|(token, tag)| {
            let category = PosCategory::from_tag(&tag);
            *counts.entry(category).or_default() += 1;
            HighlightedToken {
                token,
                tag,
                category,
                label: category.label(),
            }
        })
        .collect();

    let mut legend: Vec<LegendEntry> = counts
        .into_iter()
        .map(|(category, count)| LegendEntry {
            category,
            label: category.label(),
            count,
        })
        .collect();
    legend.sort_by(|a, b| b.count.cmp(&a.count).then(a.label.cmp(b.label)));

    Ok(into_context(PosHighlight {
        highlighted,
        legend,
        token_count: tokens.len(),
    }))
}

// ──────────────────────────── Statistics ────────────────────────────

#[derive(Debug, Serialize)]
struct CommonWord {
    word: String,
    count: u64,
    percentage: f64,
}

#[derive(Debug, Serialize)]
struct Statistics {
    token_count: usize,
    unique_token_count: usize,
    repertoire: f64,
    sentence_count: usize,
    average_sentence_length: f64,
    longest_sentence_length: usize,
    most_common: Vec<CommonWord>,
}

fn ratio(part: f64, whole: f64) -> f64 {
    if whole == 0.0 { 0.0 } else { part / whole }
}

pub fn statistics(mut context: Context) -> Result<Context, TransformError> {
    let tokens: Vec<String> = take(&mut context, "tokens")?;
    let sentences: Vec<Vec<String>> = take(&mut context, "sentences")?;
    let mut freqdist: Vec<(String, u64)> = take(&mut context, "freqdist")?;

    let token_count = tokens.len();
    let unique_token_count = freqdist.len();
    let sentence_count = sentences.len();
    let longest_sentence_length = sentences.iter().map(Vec::len).max().unwrap_or(0);
    let sentence_tokens: usize = sentences.iter().map(Vec::len).sum();

    freqdist.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let most_common = freqdist
        .into_iter()
        .take(MOST_COMMON_LIMIT)
        .map(|(word, count)| CommonWord {
            percentage: 100.0 * ratio(count as f64, token_count as f64),
            word,
            count,
        })
        .collect();

    Ok(into_context(Statistics {
        token_count,
        unique_token_count,
        repertoire: 100.0 * ratio(unique_token_count as f64, token_count as f64),
        sentence_count,
        average_sentence_length: ratio(sentence_tokens as f64, sentence_count as f64),
        longest_sentence_length,
        most_common,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(value: Value) -> Context {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_tag_categories() {
        assert_eq!(PosCategory::from_tag("NN"), PosCategory::Noun);
        assert_eq!(PosCategory::from_tag("NNS"), PosCategory::Noun);
        assert_eq!(PosCategory::from_tag("NNP"), PosCategory::ProperNoun);
        assert_eq!(PosCategory::from_tag("VBZ"), PosCategory::Verb);
        assert_eq!(PosCategory::from_tag("PRP$"), PosCategory::Pronoun);
        assert_eq!(PosCategory::from_tag("WRB"), PosCategory::Adverb);
        assert_eq!(PosCategory::from_tag("."), PosCategory::Punctuation);
        assert_eq!(PosCategory::from_tag("ART"), PosCategory::Determiner);
        assert_eq!(PosCategory::from_tag("FW"), PosCategory::Other);
    }

    #[test]
    fn test_pos_highlighter_output() {
        let input = context(json!({
            "pos": [["This", "DT", 0], ["is", "VBZ", 5], ["our", "PRP$", 8], ["content", "NN", 12]],
            "tokens": ["This", "is", "our", "content"],
        }));
        let output = pos_highlighter(input).unwrap();

        assert_eq!(output["token_count"], json!(4));
        let highlighted = output["highlighted"].as_array().unwrap();
        assert_eq!(highlighted.len(), 4);
        assert_eq!(highlighted[1]["token"], json!("is"));
        assert_eq!(highlighted[1]["category"], json!("verb"));
        assert_eq!(highlighted[2]["category"], json!("pronoun"));
        assert_eq!(output["legend"].as_array().unwrap().len(), 4);
        assert!(output.get("pos").is_none());
    }

    #[test]
    fn test_pos_highlighter_accepts_pairs_and_orders_legend() {
        let input = context(json!({
            "pos": [["dogs", "NNS"], ["cats", "NNS"], ["run", "VBP"]],
            "tokens": ["dogs", "cats", "run"],
        }));
        let output = pos_highlighter(input).unwrap();
        let legend = output["legend"].as_array().unwrap();
        assert_eq!(legend[0]["category"], json!("noun"));
        assert_eq!(legend[0]["count"], json!(2));
        assert_eq!(legend[1]["label"], json!("Verb"));
    }

    #[test]
    fn test_pos_highlighter_malformed() {
        let input = context(json!({"pos": [["only-token"]], "tokens": []}));
        assert!(matches!(
            pos_highlighter(input),
            Err(TransformError::Malformed { field: "pos", .. })
        ));

        let input = context(json!({"pos": []}));
        assert!(matches!(
            pos_highlighter(input),
            Err(TransformError::MissingField("tokens"))
        ));
    }

    #[test]
    fn test_statistics() {
        let input = context(json!({
            "tokens": ["the", "cat", "saw", "the", "dog", "."],
            "sentences": [["the", "cat", "saw", "the", "dog", "."]],
            "freqdist": [["cat", 1], ["the", 2], ["saw", 1], ["dog", 1], [".", 1]],
        }));
        let output = statistics(input).unwrap();

        assert_eq!(output["token_count"], json!(6));
        assert_eq!(output["unique_token_count"], json!(5));
        assert_eq!(output["sentence_count"], json!(1));
        assert_eq!(output["longest_sentence_length"], json!(6));
        assert_eq!(output["average_sentence_length"], json!(6.0));
        let most_common = output["most_common"].as_array().unwrap();
        assert_eq!(most_common[0]["word"], json!("the"));
        assert_eq!(most_common[0]["count"], json!(2));
        // Ties keep alphabetical order.
        assert_eq!(most_common[1]["word"], json!("."));
    }

    #[test]
    fn test_statistics_empty_document() {
        let input = context(json!({"tokens": [], "sentences": [], "freqdist": []}));
        let output = statistics(input).unwrap();
        assert_eq!(output["repertoire"], json!(0.0));
        assert_eq!(output["average_sentence_length"], json!(0.0));
        assert_eq!(output["most_common"], json!([]));
    }
}
