//! Size-bounded text chunking with header context.
//!
//! A page at or below the size threshold becomes a single chunk. Larger
//! pages are split on second-level header markers into segments that each
//! carry the page's top-level header, and any segment still longer than
//! 1.2× the threshold is sliced into overlapping windows (window length
//! 1.2×C, step C) so no content is truncated at an arbitrary boundary.
//!
//! Chunk file names are derived deterministically from
//! `(source link, section index, window index)` and are collision-free
//! within a run.

use docqa_shared::DocumentChunk;
use tracing::debug;

/// Marker that opens a second-level header section.
const SECTION_MARKER: &str = "\n## ";

/// Maximum chunk length for a given threshold: `C × 1.2`.
pub fn max_chunk_len(threshold: usize) -> usize {
    threshold + threshold / 5
}

/// Split one page's extracted text into ordered [`DocumentChunk`]s.
pub fn chunk_page(source_link: &str, text: &str, threshold: usize) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();

    if text.len() <= threshold {
        // A whole page below the threshold is kept unchanged, exempt from
        // the 1.2×C bound.
        chunks.push(make_chunk(source_link, 0, 0, text.to_string()));
        return chunks;
    }

    let segments = split_segments(text, threshold);
    debug!(link = source_link, segments = segments.len(), "page split into segments");

    for (section, segment) in segments.into_iter().enumerate() {
        for (window, slice) in window_segment(&segment, threshold).into_iter().enumerate() {
            chunks.push(make_chunk(source_link, section, window, slice));
        }
    }

    chunks
}

fn make_chunk(source_link: &str, section: usize, window: usize, text: String) -> DocumentChunk {
    DocumentChunk {
        file_name: chunk_file_name(source_link, section, window),
        source_link: source_link.to_string(),
        section,
        window,
        text,
    }
}

/// Split text into segments on `\n## ` markers.
///
/// A running buffer accumulates header sections; after the first flush it
/// always restarts with the page's top-level header (the first line) so
/// every segment keeps its page context. The buffer is flushed once its
/// length exceeds the threshold, and at the end of input.
fn split_segments(text: &str, threshold: usize) -> Vec<String> {
    let header = text.lines().next().unwrap_or("");
    let mut segments = Vec::new();
    let mut buf = String::new();

    for (i, part) in text.split(SECTION_MARKER).enumerate() {
        if i > 0 {
            if buf.is_empty() {
                buf.push_str(header);
            }
            buf.push_str(SECTION_MARKER);
        }
        buf.push_str(part);

        if buf.len() > threshold {
            segments.push(std::mem::take(&mut buf));
        }
    }

    if !buf.is_empty() {
        segments.push(buf);
    }

    segments
}

/// Slice a segment into overlapping windows of length `C × 1.2` with step
/// `C`, adjusted down to char boundaries. Segments within the bound pass
/// through as a single window.
///
/// A threshold narrower than the next char's UTF-8 width would round both
/// the window end and the step back to `start`, so each is forced forward
/// to the next char boundary: every window holds at least one char and the
/// cursor always advances.
fn window_segment(segment: &str, threshold: usize) -> Vec<String> {
    let max = max_chunk_len(threshold);
    if segment.len() <= max {
        return vec![segment.to_string()];
    }

    let mut windows = Vec::new();
    let mut start = 0;
    while start < segment.len() {
        let mut end = floor_char_boundary(segment, (start + max).min(segment.len()));
        if end <= start {
            end = ceil_char_boundary(segment, start + 1);
        }
        windows.push(segment[start..end].to_string());

        let mut next = floor_char_boundary(segment, start + threshold);
        if next <= start {
            next = end;
        }
        start = next;
    }

    windows
}

/// Derive the deterministic, collision-free chunk file name for
/// `(source link, section index, window index)`.
pub fn chunk_file_name(source_link: &str, section: usize, window: usize) -> String {
    let slug: String = source_link
        .trim_start_matches('/')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let slug = if slug.is_empty() { "index".to_string() } else { slug };
    format!("{slug}.{section}.{window}.txt")
}

/// Largest char boundary at or below `index`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest char boundary at or above `index`.
fn ceil_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
