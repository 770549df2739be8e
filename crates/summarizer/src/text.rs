//! Heuristic extractive text summarizer
//!
//! Offline fallback when no chat API is configured. Cleans transcription
//! artifacts, splits the text into sentences, scores them by keyword
//! frequency, and renders one of several output shapes chosen from the
//! resolved prompt text (key points, timeline, action items, meeting,
//! or a general summary).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use video_digest_common::{Result, Summarizer};

use crate::write_summary_file;

/// Offline extractive summarizer
pub struct TextSummarizer {
    tmp_dir: PathBuf,
}

impl TextSummarizer {
    #[must_use]
    pub fn new(tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            tmp_dir: tmp_dir.into(),
        }
    }
}

#[async_trait]
impl Summarizer for TextSummarizer {
    async fn summarize(&self, text: &str, prompt: &str, _max_tokens: u32) -> Result<PathBuf> {
        let summary = render_summary(text, prompt);
        write_summary_file(&self.tmp_dir, &summary).await
    }
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn parenthetical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").unwrap())
}

/// Normalize whitespace and strip transcription artifacts like
/// `(applause)` or `[music]`.
fn clean_text(text: &str) -> String {
    let text = parenthetical_re().replace_all(text, "");
    whitespace_re().replace_all(text.trim(), " ").into_owned()
}

fn split_sentences(text: &str) -> Vec<String> {
    text.split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.chars().filter(char::is_ascii_alphanumeric).count() >= 3)
        .map(str::to_string)
        .collect()
}

const STOP_WORDS: &[&str] = &[
    "the", "and", "that", "this", "with", "for", "are", "was", "were", "have", "has", "had",
    "you", "your", "they", "them", "their", "what", "when", "where", "which", "will", "would",
    "can", "could", "should", "there", "here", "about", "just", "like", "know", "going", "get",
    "got", "really", "think", "because", "been", "being", "but", "not", "from", "into", "out",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Most frequent non-stop-words, longest-streak first on ties.
fn key_phrases(text: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in text.split_whitespace() {
        let word: String = word
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_lowercase();
        if word.len() < 4 || is_stop_word(&word) {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(word, _)| word).collect()
}

/// Sentences ranked by how many key phrases they contain, returned in
/// their original order.
fn top_sentences(sentences: &[String], phrases: &[String], limit: usize) -> Vec<String> {
    let mut scored: Vec<(usize, usize)> = sentences
        .iter()
        .enumerate()
        .map(|(index, sentence)| {
            let lower = sentence.to_lowercase();
            let score = phrases.iter().filter(|p| lower.contains(p.as_str())).count();
            (index, score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut picked: Vec<usize> = scored.into_iter().take(limit).map(|(i, _)| i).collect();
    picked.sort_unstable();
    picked.into_iter().map(|i| sentences[i].clone()).collect()
}

/// Which output shape a resolved prompt asks for.
fn select_shape(prompt: &str) -> Shape {
    let prompt = prompt.to_lowercase();
    if prompt.contains("key points") || prompt.contains("bullet list") {
        Shape::KeyPoints
    } else if prompt.contains("timeline") || prompt.contains("chronological") {
        Shape::Timeline
    } else if prompt.contains("action items") || prompt.contains("actionable") {
        Shape::ActionItems
    } else if prompt.contains("meeting") || prompt.contains("decisions") {
        Shape::Meeting
    } else {
        Shape::General
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    General,
    KeyPoints,
    Timeline,
    ActionItems,
    Meeting,
}

fn render_summary(text: &str, prompt: &str) -> String {
    let cleaned = clean_text(text);
    if cleaned.is_empty() {
        return "No content to summarize.".to_string();
    }

    let sentences = split_sentences(&cleaned);
    if sentences.is_empty() {
        return "No meaningful content found.".to_string();
    }

    let phrases = key_phrases(&cleaned, 8);
    match select_shape(prompt) {
        Shape::General => render_general(&cleaned, &sentences, &phrases),
        Shape::KeyPoints => render_list("Key Points", &sentences, &phrases, 5),
        Shape::Timeline => render_timeline(&sentences),
        Shape::ActionItems => render_list("Action Items", &sentences, &phrases, 5),
        Shape::Meeting => render_meeting(&sentences, &phrases),
    }
}

fn render_general(text: &str, sentences: &[String], phrases: &[String]) -> String {
    if sentences.len() <= 3 {
        return sentences.join(" ");
    }

    let mut summary = String::from("Content Summary:\n");
    if !phrases.is_empty() {
        let topics: Vec<&str> = phrases.iter().take(3).map(String::as_str).collect();
        summary.push_str(&format!("- Main topics: {}\n", topics.join(", ")));
    }
    summary.push_str(&format!(
        "- Content length: {} words\n",
        text.split_whitespace().count()
    ));
    summary.push_str(&format!("- Opening: {}\n", sentences[0]));
    if sentences.len() > 2 {
        summary.push_str(&format!("- Closing: {}\n", sentences[sentences.len() - 1]));
    }
    summary
}

fn render_list(title: &str, sentences: &[String], phrases: &[String], limit: usize) -> String {
    let mut out = format!("{title}:\n");
    for sentence in top_sentences(sentences, phrases, limit) {
        out.push_str(&format!("- {sentence}\n"));
    }
    out
}

fn render_timeline(sentences: &[String]) -> String {
    let mut out = String::from("Timeline:\n");
    let step = (sentences.len() / 5).max(1);
    for (position, sentence) in sentences.iter().step_by(step).take(5).enumerate() {
        out.push_str(&format!("{}. {sentence}\n", position + 1));
    }
    out
}

fn render_meeting(sentences: &[String], phrases: &[String]) -> String {
    let mut out = String::from("Meeting Summary:\n");
    if !phrases.is_empty() {
        let topics: Vec<&str> = phrases.iter().take(3).map(String::as_str).collect();
        out.push_str(&format!("Discussion topics: {}\n", topics.join(", ")));
    }
    out.push_str("Key moments:\n");
    for sentence in top_sentences(sentences, phrases, 4) {
        out.push_str(&format!("- {sentence}\n"));
    }
    out
}
