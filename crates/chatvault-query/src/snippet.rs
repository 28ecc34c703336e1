//! Snippet extraction and keyword highlighting.
//!
//! Pure text processing: no storage or tokenizer involvement. All
//! indexing is done in characters, not bytes, so multi-byte content is
//! safe to slice.

/// Default excerpt length in characters.
pub const DEFAULT_MAX_LENGTH: usize = 150;

/// Highlight markers wrapped around every keyword occurrence.
pub const HIGHLIGHT_OPEN: &str = "**";
pub const HIGHLIGHT_CLOSE: &str = "**";

/// How far a window edge may move to land on a word boundary.
const BOUNDARY_TOLERANCE: usize = 20;

const ELLIPSIS: &str = "...";

/// Extract a bounded excerpt of `content` centered on the earliest
/// keyword match, with every keyword occurrence highlighted.
///
/// With no match the leading `max_length` characters are returned,
/// ellipsized when truncated. Matching is case-insensitive.
pub fn generate_snippet(content: &str, keywords: &[&str], max_length: usize) -> String {
    if content.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = content.chars().collect();

    // Earliest match across all keywords; keyword lengths differ, so
    // the matched length travels with the index.
    let mut earliest: Option<(usize, usize)> = None;
    for keyword in keywords {
        let needle: Vec<char> = keyword.chars().map(fold_char).collect();
        if needle.is_empty() {
            continue;
        }
        if let Some(idx) = find_from(&chars, &needle, 0) {
            let better = match earliest {
                Some((best, _)) => idx < best,
                None => true,
            };
            if better {
                earliest = Some((idx, needle.len()));
            }
        }
    }

    let Some((match_idx, match_len)) = earliest else {
        if chars.len() <= max_length {
            return content.to_string();
        }
        let head: String = chars[..max_length].iter().collect();
        return format!("{}{}", head, ELLIPSIS);
    };

    // Window of max_length centered on the match, clamped to bounds.
    let half = max_length / 2;
    let mut start = match_idx.saturating_sub(half);
    let mut end = (match_idx + match_len + half).min(chars.len());

    // Soften edges: snap to nearby spaces instead of splitting words.
    if start > 0 && chars[start] != ' ' {
        if let Some(space) = chars[..start].iter().rposition(|&c| c == ' ') {
            if start - space <= BOUNDARY_TOLERANCE {
                start = space + 1;
            }
        }
    }
    if end < chars.len() && chars[end] != ' ' {
        if let Some(offset) = chars[end..].iter().position(|&c| c == ' ') {
            if offset <= BOUNDARY_TOLERANCE {
                end += offset;
            }
        }
    }

    let mut snippet: String = chars[start..end].iter().collect();
    // Every occurrence of every keyword gets wrapped; overlapping
    // marks are not deduplicated.
    for keyword in keywords {
        snippet = highlight_all(&snippet, keyword);
    }

    let mut out = String::new();
    if start > 0 {
        out.push_str(ELLIPSIS);
    }
    out.push_str(&snippet);
    if end < chars.len() {
        out.push_str(ELLIPSIS);
    }
    out
}

/// Lowercase-fold a single char without changing its width.
fn fold_char(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// First case-insensitive occurrence of `needle` (already folded) in
/// `haystack`, at or after `from`.
fn find_from(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| {
        haystack[i..i + needle.len()]
            .iter()
            .zip(needle)
            .all(|(&h, &n)| fold_char(h) == n)
    })
}

/// Wrap every case-insensitive occurrence of `keyword` in highlight
/// markers, preserving the original casing of the matched text.
fn highlight_all(text: &str, keyword: &str) -> String {
    let needle: Vec<char> = keyword.chars().map(fold_char).collect();
    if needle.is_empty() {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let is_match = i + needle.len() <= chars.len()
            && chars[i..i + needle.len()]
                .iter()
                .zip(&needle)
                .all(|(&h, &n)| fold_char(h) == n);
        if is_match {
            out.push_str(HIGHLIGHT_OPEN);
            out.extend(&chars[i..i + needle.len()]);
            out.push_str(HIGHLIGHT_CLOSE);
            i += needle.len();
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}
