//! Response formatter: raw model text -> structured HTML.
//!
//! Parsing happens in two phases. A pre-pass rewrites bracketed callout tags
//! (`[WARNING]..[/WARNING]`, `[TIP]..[/TIP]`, `[COST]..[/COST]`) into
//! single-line markers, then a line-by-line state machine produces a typed
//! block sequence. Rendering is a pure function of that sequence; a list
//! block owns its items, so the output can never contain an unmatched
//! opening tag.
//!
//! The formatter is total: it never errors, and empty or whitespace-only
//! input yields empty output.

use once_cell::sync::Lazy;
use regex::Regex;

/// Lines ending with ':' at or under this length render as bold headers.
pub const SHORT_HEADER_MAX_CHARS: usize = 60;

/// Leading emoji that promote a line to a section header.
pub const SECTION_HEADER_EMOJI: &[&str] =
    &["🔧", "🛠️", "💡", "⚠️", "🚗", "🔋", "🔍", "💰", "🧰", "🚨"];

/// Bullet patterns in priority order; the first match wins. Order matters:
/// the decimal pattern must be tried before lettered, and lettered before
/// roman, so "1." / "a." / "iv." each land on the intended matcher.
static BULLET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^▶️\s*(.+)$").unwrap(),
        Regex::new(r"^[-*•]\s+(.+)$").unwrap(),
        Regex::new(r"^\d+\.\s+(.+)$").unwrap(),
        Regex::new(r"^[a-zA-Z]\.\s+(.+)$").unwrap(),
        Regex::new(r"(?i)^[ivxlcdm]+\.\s+(.+)$").unwrap(),
    ]
});

/// Keycap-digit step lines, e.g. "1️⃣ Remove the wheel".
static EMOJI_STEP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[0-9]\u{FE0F}?\u{20E3}").unwrap());

/// Bracketed callout tags, case-insensitive, bodies may span lines.
static CALLOUT_PATTERNS: Lazy<Vec<(CalloutKind, Regex)>> = Lazy::new(|| {
    vec![
        (
            CalloutKind::Warning,
            Regex::new(r"(?is)\[WARNING\](.*?)\[/WARNING\]").unwrap(),
        ),
        (
            CalloutKind::Tip,
            Regex::new(r"(?is)\[TIP\](.*?)\[/TIP\]").unwrap(),
        ),
        (
            CalloutKind::Cost,
            Regex::new(r"(?is)\[COST\](.*?)\[/COST\]").unwrap(),
        ),
    ]
});

static MULTI_BREAK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(<br>\s*){2,}").unwrap());

// Internal single-line markers for callouts that survived the pre-pass.
const CALLOUT_MARK: char = '\u{1}';
const CALLOUT_SEP: char = '\u{2}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalloutKind {
    Warning,
    Tip,
    Cost,
}

impl CalloutKind {
    fn tag(&self) -> &'static str {
        match self {
            CalloutKind::Warning => "warning",
            CalloutKind::Tip => "tip",
            CalloutKind::Cost => "cost",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "warning" => Some(CalloutKind::Warning),
            "tip" => Some(CalloutKind::Tip),
            "cost" => Some(CalloutKind::Cost),
            _ => None,
        }
    }
}

/// Typed output segment. The rendered markup is a pure function of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(String),
    BoldHeader(String),
    SectionHeader(String),
    Step(String),
    Callout { kind: CalloutKind, body: String },
    List(Vec<String>),
    Break,
}

/// Format raw model text into display HTML.
pub fn format_response(raw: &str) -> String {
    render_blocks(&parse_blocks(raw))
}

/// Parse raw text into an ordered block sequence.
pub fn parse_blocks(raw: &str) -> Vec<Block> {
    let text = raw.trim();
    if text.is_empty() {
        return Vec::new();
    }
    let text = inline_callouts(text);

    let mut blocks = Vec::new();
    // `Some` while inside a list; the pending items become one List block.
    let mut open_list: Option<Vec<String>> = None;

    for line in text.lines() {
        let line = line.trim();

        if line.is_empty() {
            close_list(&mut open_list, &mut blocks);
            blocks.push(Block::Break);
            continue;
        }

        if let Some((kind, body)) = decode_callout(line) {
            close_list(&mut open_list, &mut blocks);
            blocks.push(Block::Callout { kind, body });
            continue;
        }

        if EMOJI_STEP_RE.is_match(line) {
            close_list(&mut open_list, &mut blocks);
            blocks.push(Block::Step(line.to_string()));
            continue;
        }

        if SECTION_HEADER_EMOJI.iter().any(|e| line.starts_with(e)) {
            close_list(&mut open_list, &mut blocks);
            blocks.push(Block::SectionHeader(line.to_string()));
            continue;
        }

        if let Some(item) = match_bullet(line) {
            open_list.get_or_insert_with(Vec::new).push(decorate_item(&item));
            continue;
        }

        close_list(&mut open_list, &mut blocks);
        if line.ends_with(':') && line.chars().count() <= SHORT_HEADER_MAX_CHARS {
            blocks.push(Block::BoldHeader(line.to_string()));
        } else {
            blocks.push(Block::Paragraph(line.to_string()));
        }
    }

    close_list(&mut open_list, &mut blocks);
    blocks
}

/// Render a block sequence to HTML. Consecutive break markers collapse to at
/// most two; leading and trailing break markers are stripped.
pub fn render_blocks(blocks: &[Block]) -> String {
    let mut parts = Vec::with_capacity(blocks.len());
    for block in blocks {
        parts.push(match block {
            Block::Paragraph(text) => format!("<p>{text}</p>"),
            Block::BoldHeader(text) => format!("<p><strong>{text}</strong></p>"),
            Block::SectionHeader(text) => {
                format!("<div class=\"section-header\">{text}</div>")
            }
            Block::Step(text) => format!("<div class=\"emoji-step\">{text}</div>"),
            Block::Callout { kind, body } => render_callout(*kind, body),
            Block::List(items) => {
                let items: String = items
                    .iter()
                    .map(|item| format!("<li>{item}</li>"))
                    .collect();
                format!("<ul class=\"emoji-list\">{items}</ul>")
            }
            Block::Break => "<br>".to_string(),
        });
    }
    collapse_breaks(&parts.concat())
}

fn render_callout(kind: CalloutKind, body: &str) -> String {
    match kind {
        CalloutKind::Warning => {
            format!("<div class=\"warning-box\">⚠️ <strong>Warning:</strong> {body}</div>")
        }
        CalloutKind::Tip => {
            format!("<div class=\"tip-box\">💡 <strong>Pro Tip:</strong> {body}</div>")
        }
        CalloutKind::Cost => {
            format!("<div class=\"cost-box\">💰 <strong>Cost Estimate:</strong> {body}</div>")
        }
    }
}

/// Rewrite every bracketed callout into a newline-delimited single-line
/// marker so the line machine sees it as one block. Substitutions are
/// non-overlapping and applied per kind.
fn inline_callouts(text: &str) -> String {
    let mut out = text.to_string();
    for (kind, pattern) in CALLOUT_PATTERNS.iter() {
        out = pattern
            .replace_all(&out, |caps: &regex::Captures| {
                let body = caps[1].replace(['\r', '\n'], " ");
                format!(
                    "\n{CALLOUT_MARK}{}{CALLOUT_SEP}{}\n",
                    kind.tag(),
                    body.trim()
                )
            })
            .into_owned();
    }
    out
}

fn decode_callout(line: &str) -> Option<(CalloutKind, String)> {
    let rest = line.strip_prefix(CALLOUT_MARK)?;
    let (tag, body) = rest.split_once(CALLOUT_SEP)?;
    Some((CalloutKind::from_tag(tag)?, body.to_string()))
}

/// First bullet pattern that matches, returning the item content.
fn match_bullet(line: &str) -> Option<String> {
    BULLET_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(line))
        .map(|caps| caps[1].trim().to_string())
}

/// List items carry a uniform arrow marker.
fn decorate_item(item: &str) -> String {
    if item.starts_with("▶️") {
        item.to_string()
    } else {
        format!("▶️ {item}")
    }
}

fn close_list(open_list: &mut Option<Vec<String>>, blocks: &mut Vec<Block>) {
    if let Some(items) = open_list.take() {
        blocks.push(Block::List(items));
    }
}

/// Whitespace cleanup over rendered markup. Idempotent.
pub(crate) fn collapse_breaks(html: &str) -> String {
    let collapsed = MULTI_BREAK_RE.replace_all(html, "<br><br>");
    let mut trimmed = collapsed.as_ref();
    while let Some(rest) = trimmed.strip_prefix("<br>") {
        trimmed = rest;
    }
    while let Some(rest) = trimmed.strip_suffix("<br>") {
        trimmed = rest;
    }
    trimmed.to_string()
}
