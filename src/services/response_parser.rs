use crate::models::item::{Difficulty, GeneratedItem};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value as JsonValue;

const MAX_DISTRACTORS: usize = 3;
const QUESTION_KEYS: &[&str] = &["question", "text"];
const ANSWER_KEYS: &[&str] = &["correctAnswer", "correct_answer", "answer"];
const DISTRACTOR_LIST_KEYS: &[&str] = &["wrongAnswers", "wrong_answers", "distractors"];

pub fn parse(raw: &str, difficulty: Difficulty) -> Option<GeneratedItem> {
    let mut rng = rand::thread_rng();
    parse_with_rng(raw, difficulty, &mut rng)
}

pub fn parse_with_rng<R: Rng + ?Sized>(
    raw: &str,
    difficulty: Difficulty,
    rng: &mut R,
) -> Option<GeneratedItem> {
    let cleaned = strip_fences(raw);
    let object = extract_object(&cleaned)?;
    let value = parse_lenient(object)?;

    let text = first_string(&value, QUESTION_KEYS)?;
    let correct_answer = first_string(&value, ANSWER_KEYS)?;

    let mut options = vec![correct_answer.clone()];
    for distractor in distractors(&value).into_iter().take(MAX_DISTRACTORS) {
        if !options.contains(&distractor) {
            options.push(distractor);
        }
    }
    if options.len() < 2 {
        tracing::debug!(question = %text, "Rejected item with fewer than two distinct options");
        return None;
    }
    options.shuffle(rng);

    let reference = value
        .get("reference")
        .and_then(scalar_to_string)
        .unwrap_or_default();

    Some(GeneratedItem {
        text,
        correct_answer,
        options,
        reference,
        difficulty,
        points: difficulty.points(),
        generated: true,
        unique_id: uuid::Uuid::new_v4().to_string(),
    })
}

pub fn strip_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```JSON", "").replace("```", "")
}

pub fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

fn parse_lenient(object: &str) -> Option<JsonValue> {
    if let Ok(v @ JsonValue::Object(_)) = serde_json::from_str::<JsonValue>(object) {
        return Some(v);
    }
    let repaired = repair_json(object);
    match serde_json::from_str::<JsonValue>(&repaired) {
        Ok(v @ JsonValue::Object(_)) => Some(v),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Completion JSON could not be repaired");
            None
        }
    }
}

// Unescape every \" first, then re-escape quotes inside strings that are not followed by
// `,` `}` `]` `:` or end of input.
pub fn repair_json(input: &str) -> String {
    let unescaped = input.replace("\\\"", "\"");
    let chars: Vec<char> = unescaped.chars().collect();
    let mut out = String::with_capacity(chars.len() + 16);
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            i += 1;
            continue;
        }
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                    i += 1;
                }
            }
            '"' => {
                let next = chars[i + 1..].iter().copied().find(|ch| !ch.is_whitespace());
                match next {
                    None | Some(',') | Some('}') | Some(']') | Some(':') => {
                        in_string = false;
                        out.push('"');
                    }
                    Some(_) => out.push_str("\\\""),
                }
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

fn scalar_to_string(v: &JsonValue) -> Option<String> {
    let s = match v {
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn first_string(value: &JsonValue, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(scalar_to_string))
}

fn distractors(value: &JsonValue) -> Vec<String> {
    let mut out: Vec<String> = (1..=MAX_DISTRACTORS)
        .filter_map(|n| {
            first_string(
                value,
                &[
                    format!("wrongAnswer{}", n).as_str(),
                    format!("wrong_answer{}", n).as_str(),
                    format!("wrong_answer_{}", n).as_str(),
                ],
            )
        })
        .collect();
    if out.is_empty() {
        if let Some(list) = DISTRACTOR_LIST_KEYS
            .iter()
            .find_map(|k| value.get(*k).and_then(|v| v.as_array()))
        {
            out = list.iter().filter_map(scalar_to_string).collect();
        }
    }
    out
}
