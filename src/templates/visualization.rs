//! Visualization templates, resolved by `(visualization key, format)`.
//!
//! Each renderer reads its template context back out of the generic
//! [`Context`] map into a typed view, so a template can only ever be filled
//! from fields that actually exist.

use askama::Template;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{RenderError, csv_field};
use crate::models::document::Document;
use crate::models::language::language_name;
use crate::visualization::registry::Context;

/// Words shown in the HTML word cloud.
const WORD_CLOUD_LIMIT: usize = 150;

/// Every format some visualization template is written in.
const FORMATS: &[&str] = &["html", "csv", "txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizationTemplate {
    PlainTextHtml,
    PlainTextTxt,
    WordCloudHtml,
    WordCloudCsv,
    PosHighlighterHtml,
    PosHighlighterCsv,
    StatisticsHtml,
    StatisticsCsv,
}

impl VisualizationTemplate {
    pub fn lookup(key: &str, format: &str) -> Option<Self> {
        let template = match (key, format) {
            ("plain-text", "html") => Self::PlainTextHtml,
            ("plain-text", "txt") => Self::PlainTextTxt,
            ("word-cloud", "html") => Self::WordCloudHtml,
            ("word-cloud", "csv") => Self::WordCloudCsv,
            ("pos-highlighter", "html") => Self::PosHighlighterHtml,
            ("pos-highlighter", "csv") => Self::PosHighlighterCsv,
            ("statistics", "html") => Self::StatisticsHtml,
            ("statistics", "csv") => Self::StatisticsCsv,
            _ => return None,
        };
        Some(template)
    }

    /// Downloadable (non-HTML) formats available for a visualization.
    pub fn downloads_for(key: &str) -> Vec<&'static str> {
        FORMATS
            .iter()
            .copied()
            .filter(|format| *format != "html" && Self::lookup(key, format).is_some())
            .collect()
    }

    /// Template path under `templates/`.
    pub fn name(self) -> &'static str {
        match self {
            Self::PlainTextHtml => "visualizations/plain-text.html",
            Self::PlainTextTxt => "visualizations/plain-text.txt",
            Self::WordCloudHtml => "visualizations/word-cloud.html",
            Self::WordCloudCsv => "visualizations/word-cloud.csv",
            Self::PosHighlighterHtml => "visualizations/pos-highlighter.html",
            Self::PosHighlighterCsv => "visualizations/pos-highlighter.csv",
            Self::StatisticsHtml => "visualizations/statistics.html",
            Self::StatisticsCsv => "visualizations/statistics.csv",
        }
    }

    pub fn render(self, context: &Context, document: &Document) -> Result<String, RenderError> {
        let body = match self {
            Self::PlainTextHtml => {
                let data: PlainTextData = view(context)?;
                PlainTextHtml { document, text: &data.text }.render()?
            }
            Self::PlainTextTxt => {
                let data: PlainTextData = view(context)?;
                PlainTextTxt { text: &data.text }.render()?
            }
            Self::WordCloudHtml => {
                let data: WordCloudData = view(context)?;
                WordCloudHtml {
                    document,
                    language: language_name(&data.language),
                    words: weighted_words(&data.freqdist),
                }
                .render()?
            }
            Self::WordCloudCsv => {
                let data: WordCloudData = view(context)?;
                WordCloudCsv {
                    rows: data
                        .freqdist
                        .iter()
                        .map(|(word, count)| CsvRow::new([csv_field(word), count.to_string()]))
                        .collect(),
                }
                .render()?
            }
            Self::PosHighlighterHtml => {
                let data: PosData = view(context)?;
                PosHighlighterHtml {
                    document,
                    tokens: &data.highlighted,
                    legend: &data.legend,
                    token_count: data.token_count,
                }
                .render()?
            }
            Self::PosHighlighterCsv => {
                let data: PosData = view(context)?;
                PosHighlighterCsv {
                    rows: data
                        .highlighted
                        .iter()
                        .map(|t| {
                            CsvRow::new([csv_field(&t.token), csv_field(&t.tag), t.category.clone()])
                        })
                        .collect(),
                }
                .render()?
            }
            Self::StatisticsHtml => {
                let data: StatisticsData = view(context)?;
                StatisticsHtml {
                    document,
                    stats: StatisticsView::from(&data),
                }
                .render()?
            }
            Self::StatisticsCsv => {
                let data: StatisticsData = view(context)?;
                let stats = StatisticsView::from(&data);
                StatisticsCsv {
                    rows: stats
                        .summary
                        .iter()
                        .map(|row| CsvRow::new([row.key.to_string(), row.value.clone()]))
                        .collect(),
                    words: data
                        .most_common
                        .iter()
                        .map(|w| {
                            CsvRow::new([
                                csv_field(&w.word),
                                w.count.to_string(),
                                format!("{:.2}", w.percentage),
                            ])
                        })
                        .collect(),
                }
                .render()?
            }
        };
        Ok(body)
    }
}

fn view<T: DeserializeOwned>(context: &Context) -> Result<T, RenderError> {
    Ok(serde_json::from_value(Value::Object(context.clone()))?)
}

/// One pre-quoted CSV line.
pub struct CsvRow {
    pub line: String,
}

impl CsvRow {
    fn new<const N: usize>(fields: [String; N]) -> Self {
        Self {
            line: fields.join(","),
        }
    }
}

// ──────────────────────────── Plain text ────────────────────────────

#[derive(Deserialize)]
struct PlainTextData {
    text: String,
}

#[derive(Template)]
#[template(path = "visualizations/plain-text.html")]
struct PlainTextHtml<'a> {
    document: &'a Document,
    text: &'a str,
}

#[derive(Template)]
#[template(path = "visualizations/plain-text.txt", escape = "none")]
struct PlainTextTxt<'a> {
    text: &'a str,
}

// ──────────────────────────── Word cloud ────────────────────────────

#[derive(Deserialize)]
struct WordCloudData {
    freqdist: Vec<(String, u64)>,
    language: String,
}

pub struct WeightedWord {
    pub word: String,
    pub count: u64,
    /// Font size bucket, 1 (rarest) to 5 (most frequent).
    pub weight: u64,
}

fn weighted_words(freqdist: &[(String, u64)]) -> Vec<WeightedWord> {
    let mut sorted: Vec<&(String, u64)> = freqdist.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(WORD_CLOUD_LIMIT);

    let max = sorted.first().map(|(_, c)| *c).unwrap_or(0);
    let min = sorted.last().map(|(_, c)| *c).unwrap_or(0);
    let mut words: Vec<WeightedWord> = sorted
        .into_iter()
        .map(|(word, count)| WeightedWord {
            word: word.clone(),
            count: *count,
            weight: if max > min {
                1 + ((count - min) * 4) / (max - min)
            } else {
                1
            },
        })
        .collect();
    words.sort_by(|a, b| a.word.cmp(&b.word));
    words
}

#[derive(Template)]
#[template(path = "visualizations/word-cloud.html")]
struct WordCloudHtml<'a> {
    document: &'a Document,
    language: &'a str,
    words: Vec<WeightedWord>,
}

#[derive(Template)]
#[template(path = "visualizations/word-cloud.csv", escape = "none")]
struct WordCloudCsv {
    rows: Vec<CsvRow>,
}

// ──────────────────────────── Part of speech ────────────────────────────

#[derive(Deserialize)]
struct PosData {
    highlighted: Vec<PosToken>,
    legend: Vec<PosLegend>,
    token_count: usize,
}

#[derive(Deserialize)]
pub struct PosToken {
    pub token: String,
    pub tag: String,
    pub category: String,
    pub label: String,
}

#[derive(Deserialize)]
pub struct PosLegend {
    pub category: String,
    pub label: String,
    pub count: usize,
}

#[derive(Template)]
#[template(path = "visualizations/pos-highlighter.html")]
struct PosHighlighterHtml<'a> {
    document: &'a Document,
    tokens: &'a [PosToken],
    legend: &'a [PosLegend],
    token_count: usize,
}

#[derive(Template)]
#[template(path = "visualizations/pos-highlighter.csv", escape = "none")]
struct PosHighlighterCsv {
    rows: Vec<CsvRow>,
}

// ──────────────────────────── Statistics ────────────────────────────

#[derive(Deserialize)]
struct StatisticsData {
    token_count: usize,
    unique_token_count: usize,
    repertoire: f64,
    sentence_count: usize,
    average_sentence_length: f64,
    longest_sentence_length: usize,
    most_common: Vec<CommonWord>,
}

#[derive(Deserialize)]
pub struct CommonWord {
    pub word: String,
    pub count: u64,
    pub percentage: f64,
}

pub struct CommonWordView {
    pub word: String,
    pub count: u64,
    pub percentage: String,
}

pub struct SummaryRow {
    pub key: &'static str,
    pub label: &'static str,
    pub value: String,
}

impl SummaryRow {
    fn new(key: &'static str, label: &'static str, value: String) -> Self {
        Self { key, label, value }
    }
}

struct StatisticsView {
    summary: Vec<SummaryRow>,
    most_common: Vec<CommonWordView>,
}

impl From<&StatisticsData> for StatisticsView {
    fn from(data: &StatisticsData) -> Self {
        Self {
            summary: vec![
                SummaryRow::new("tokens", "Tokens", data.token_count.to_string()),
                SummaryRow::new(
                    "unique_tokens",
                    "Unique tokens",
                    data.unique_token_count.to_string(),
                ),
                SummaryRow::new(
                    "repertoire_percent",
                    "Repertoire (%)",
                    format!("{:.2}", data.repertoire),
                ),
                SummaryRow::new("sentences", "Sentences", data.sentence_count.to_string()),
                SummaryRow::new(
                    "average_sentence_length",
                    "Average sentence length",
                    format!("{:.2}", data.average_sentence_length),
                ),
                SummaryRow::new(
                    "longest_sentence_length",
                    "Longest sentence",
                    data.longest_sentence_length.to_string(),
                ),
            ],
            most_common: data
                .most_common
                .iter()
                .map(|w| CommonWordView {
                    word: w.word.clone(),
                    count: w.count,
                    percentage: format!("{:.2}", w.percentage),
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "visualizations/statistics.html")]
struct StatisticsHtml<'a> {
    document: &'a Document,
    stats: StatisticsView,
}

#[derive(Template)]
#[template(path = "visualizations/statistics.csv", escape = "none")]
struct StatisticsCsv {
    rows: Vec<CsvRow>,
    words: Vec<CsvRow>,
}
