use std::sync::Arc;

use crate::model::{Entry, Match, Partition};
use crate::pattern::{Pattern, PatternKind};

/// Matches every entry against every pattern, producing highlight partitions.
/// Corpus order is preserved; matching is case-insensitive.
pub fn filter(entries: &[Arc<Entry>], patterns: &[Pattern]) -> Vec<Match> {
    entries
        .iter()
        .filter_map(|entry| match_entry(entry, patterns))
        .collect()
}

/// Orders matches best-first and bounds the result. `limit` of zero means
/// unbounded.
pub fn rank(matches: &[Match], limit: usize) -> Vec<Match> {
    let mut scored: Vec<(i64, usize, &Match)> = matches
        .iter()
        .enumerate()
        .map(|(index, m)| (score_match(m), index, m))
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let bound = if limit == 0 { scored.len() } else { limit };
    scored
        .into_iter()
        .take(bound)
        .map(|(_, _, m)| m.clone())
        .collect()
}

fn match_entry(entry: &Arc<Entry>, patterns: &[Pattern]) -> Option<Match> {
    let haystack: Vec<char> = entry.value.chars().flat_map(char::to_lowercase).collect();
    let mut positions: Vec<usize> = Vec::new();

    for pattern in patterns {
        let needle: Vec<char> = pattern
            .literal
            .chars()
            .flat_map(char::to_lowercase)
            .collect();

        match pattern.kind {
            PatternKind::Fuzzy => {
                positions.extend(subsequence_positions(&haystack, &needle)?);
            }
            PatternKind::Exact => {
                let start = substring_position(&haystack, &needle)?;
                positions.extend(start..start + needle.len());
            }
            PatternKind::InverseExact => {
                if !needle.is_empty() && substring_position(&haystack, &needle).is_some() {
                    return None;
                }
            }
        }
    }

    positions.sort_unstable();
    positions.dedup();
    Some(Match::new(entry.clone(), partitions(&entry.value, &positions)))
}

fn subsequence_positions(haystack: &[char], needle: &[char]) -> Option<Vec<usize>> {
    let mut positions = Vec::with_capacity(needle.len());
    let mut next_start = 0;

    for &needle_char in needle {
        let offset = haystack[next_start..]
            .iter()
            .position(|&hay_char| hay_char == needle_char)?;
        let absolute = next_start + offset;
        positions.push(absolute);
        next_start = absolute + 1;
    }

    Some(positions)
}

fn substring_position(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&start| haystack[start..start + needle.len()] == *needle)
}

/// Splits `value` into alternating unmatched/matched runs at the given
/// character positions.
fn partitions(value: &str, positions: &[usize]) -> Vec<Partition> {
    let chars: Vec<char> = value.chars().collect();
    let mut result = Vec::new();
    let mut unmatched = String::new();
    let mut matched = String::new();
    let mut remaining = positions.iter().copied().peekable();

    for (index, &c) in chars.iter().enumerate() {
        if remaining.peek() == Some(&index) {
            remaining.next();
            matched.push(c);
            continue;
        }
        if !matched.is_empty() {
            result.push(Partition {
                unmatched: std::mem::take(&mut unmatched),
                matched: std::mem::take(&mut matched),
            });
        }
        unmatched.push(c);
    }

    if !unmatched.is_empty() || !matched.is_empty() || result.is_empty() {
        result.push(Partition { unmatched, matched });
    }

    result
}

fn score_match(m: &Match) -> i64 {
    let value_len: i64 = m
        .partitions
        .iter()
        .map(|p| (p.unmatched.chars().count() + p.matched.chars().count()) as i64)
        .sum();
    let matched_total: i64 = m
        .partitions
        .iter()
        .map(|p| p.matched.chars().count() as i64)
        .sum();
    let fragments = m
        .partitions
        .iter()
        .filter(|p| !p.matched.is_empty())
        .count() as i64;
    let start_penalty = m
        .partitions
        .first()
        .map(|p| p.unmatched.chars().count() as i64)
        .unwrap_or(0);
    let length_penalty = (value_len - matched_total).max(0);

    if fragments <= 1 {
        // Contiguous (or empty-query) match.
        10_000 + matched_total * 40 - start_penalty - length_penalty
    } else {
        5_000 + matched_total * 30 - (fragments - 1) * 6 - start_penalty - length_penalty
    }
}
