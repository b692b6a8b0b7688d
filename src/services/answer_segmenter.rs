use regex::Regex;

/// Shortest body accepted from an anchored match; anything shorter is taken
/// to be a bare label.
const MIN_ANSWER_CHARS: usize = 10;

/// Pulls the student's answer to `question_number` out of the combined OCR
/// text.
///
/// Tries markers like `3.`, `Q3)`, `Answer 3:` up to the marker of the next
/// question. When no marker yields a usable body the text is cut into
/// `total_questions` equal chunks and the chunk at the question's position is
/// returned. That fallback is intentionally crude.
pub(crate) fn segment(ocr_text: &str, question_number: i32, total_questions: usize) -> String {
    if question_number < 1 || total_questions == 0 {
        return ocr_text.trim().to_string();
    }

    if let Some(answer) = anchored_answer(ocr_text, question_number) {
        return answer;
    }

    proportional_chunk(ocr_text, question_number, total_questions)
}

fn marker_regex(number: i32) -> Option<Regex> {
    Regex::new(&format!(r"(?i)(?:^|\s)(?:Question|Answer|Ans|Q|A)?\s*{number}\s*[.:)\-]")).ok()
}

fn anchored_answer(text: &str, number: i32) -> Option<String> {
    let current = marker_regex(number)?;
    let next = marker_regex(number + 1)?;

    for found in current.find_iter(text) {
        let rest = &text[found.end()..];
        let body = match next.find(rest) {
            Some(next_marker) => &rest[..next_marker.start()],
            None => rest,
        };
        let body = body.trim();
        if body.chars().count() > MIN_ANSWER_CHARS {
            return Some(body.to_string());
        }
    }
    None
}

fn proportional_chunk(text: &str, number: i32, total: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return String::new();
    }

    let chunk_len = chars.len().div_ceil(total);
    let start = (number as usize - 1).saturating_mul(chunk_len);
    if start >= chars.len() {
        return String::new();
    }
    let end = (start + chunk_len).min(chars.len());

    chars[start..end].iter().collect::<String>().trim().to_string()
}
