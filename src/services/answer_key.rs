use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

static QUESTION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Question|Q)\s*(\d+)\s*[.:)\-]?").expect("Invalid question marker regex")
});

static ANSWER_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Answer|Ans|A)\s*(\d+)\s*[.:)\-]?").expect("Invalid answer marker regex")
});

static ANSWER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:Answer|Ans|A)\s*(\d+)\s*[.:)\-]\s*(.*)$")
        .expect("Invalid answer line regex")
});

/// Question number to reference answer, parsed from a free-text exam key.
///
/// An empty map means the key has no recognisable structure; callers treat a
/// missing number as "no key for this question", not as a parse failure.
pub(crate) fn parse(raw: &str) -> BTreeMap<i32, String> {
    let parsed = parse_blocks(raw);
    if !parsed.is_empty() {
        return parsed;
    }
    parse_answer_lines(raw)
}

/// `Q<n> <question> A<n> <answer>` blocks, each running to the next question
/// marker or the end of the text.
fn parse_blocks(raw: &str) -> BTreeMap<i32, String> {
    let markers: Vec<(i32, usize, usize)> = QUESTION_MARKER
        .captures_iter(raw)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number = caps.get(1)?.as_str().parse::<i32>().ok()?;
            Some((number, whole.start(), whole.end()))
        })
        .collect();

    let mut answers = BTreeMap::new();
    for (index, (number, _, body_start)) in markers.iter().enumerate() {
        let block_end = markers.get(index + 1).map(|(_, start, _)| *start).unwrap_or(raw.len());
        let block = &raw[*body_start..block_end];

        let Some(answer_start) = answer_start_in_block(block, *number) else {
            continue;
        };
        let answer = block[answer_start..].trim();
        if !answer.is_empty() {
            answers.entry(*number).or_insert_with(|| answer.to_string());
        }
    }
    answers
}

/// Prefers the answer marker carrying the same number as the question.
fn answer_start_in_block(block: &str, number: i32) -> Option<usize> {
    let mut first = None;
    for caps in ANSWER_MARKER.captures_iter(block) {
        let Some(whole) = caps.get(0) else { continue };
        let matches_number =
            caps.get(1).and_then(|value| value.as_str().parse::<i32>().ok()) == Some(number);
        if matches_number {
            return Some(whole.end());
        }
        first.get_or_insert(whole.end());
    }
    first
}

fn parse_answer_lines(raw: &str) -> BTreeMap<i32, String> {
    let mut answers = BTreeMap::new();
    let mut current: Option<(i32, Vec<String>)> = None;

    for line in raw.lines() {
        if let Some(caps) = ANSWER_LINE.captures(line) {
            if let Some((number, lines)) = current.take() {
                insert_joined(&mut answers, number, lines);
            }
            let number = caps.get(1).and_then(|value| value.as_str().parse::<i32>().ok());
            let first = caps.get(2).map(|value| value.as_str().trim()).unwrap_or_default();
            current = number.map(|number| {
                let lines = if first.is_empty() { Vec::new() } else { vec![first.to_string()] };
                (number, lines)
            });
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some((_, lines)) = current.as_mut() {
            lines.push(trimmed.to_string());
        }
    }

    if let Some((number, lines)) = current {
        insert_joined(&mut answers, number, lines);
    }
    answers
}

fn insert_joined(answers: &mut BTreeMap<i32, String>, number: i32, lines: Vec<String>) {
    if lines.is_empty() {
        return;
    }
    answers.entry(number).or_insert_with(|| lines.join("\n"));
}
