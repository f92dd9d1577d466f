//! GitMsg protocol codec — typed, extensible metadata in commit messages.
//!
//! The grammar is line-oriented and quoted-string-only so commit-history
//! diffs stay readable. Parsers are total: malformed input yields `None`,
//! never a panic, and the ingest pipeline degrades gracefully on foreign
//! commits. A parsed message formatted with the writer and reparsed is
//! byte-equal to the writer's output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ─── Constants ──────────────────────────────────────────────────────

/// Protocol version written by this implementation.
pub const PROTOCOL_VERSION: &str = "0.1.0";
/// The social extension namespace and its version.
pub const SOCIAL_EXT: &str = "social";
pub const SOCIAL_EXT_VERSION: &str = "0.1.0";

// ─── Static grammar ─────────────────────────────────────────────────

static HEADER_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^--- GitMsg: (.*) ---$").expect("invalid header regex"));

static REF_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^--- GitMsg-Ref: (.*) ---$").expect("invalid ref regex"));

/// `key="value"` tokens. Values are literal and may not contain `"`.
static FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([A-Za-z_][A-Za-z0-9_:-]*)="([^"]*)""#).expect("invalid field regex"));

static EXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_-]*$").expect("invalid ext regex"));

static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("invalid version regex"));

/// Reference targets: `[url]#commit:<12-hex>` or `[url]#branch:<name>`.
static REF_TARGET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^((https?://[^#\s]+|[^#\s]+)#(commit:[a-f0-9]{12}|branch:[A-Za-z0-9/_-]+)|#(commit:[a-f0-9]{12}|branch:[A-Za-z0-9/_-]+))$",
    )
    .expect("invalid ref target regex")
});

// ─── Types ──────────────────────────────────────────────────────────

/// The `--- GitMsg: … ---` header line of a message.
///
/// Extension-specific fields keep their insertion order; the writer emits
/// `ext` first, then the extension fields, then `v` and `ext-v`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub ext: String,
    pub version: String,
    pub ext_version: String,
    pub fields: Vec<(String, String)>,
}

impl Header {
    pub fn new(ext: &str) -> Self {
        Self {
            ext: ext.to_string(),
            version: PROTOCOL_VERSION.to_string(),
            ext_version: SOCIAL_EXT_VERSION.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.push((name.to_string(), value.to_string()));
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A `--- GitMsg-Ref: … ---` section pointing at another commit, with an
/// optional multi-line metadata body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub ext: String,
    pub author: String,
    pub email: String,
    /// ISO-8601 creation time of the referenced commit, kept verbatim.
    pub time: String,
    /// The target: `[url]#commit:<12-hex>` or `[url]#branch:<name>`.
    pub target: String,
    pub version: String,
    pub ext_version: String,
    pub fields: Vec<(String, String)>,
    pub metadata: Option<String>,
}

impl Reference {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Short commit hash of a `#commit:` target, if it is one.
    pub fn commit_hash(&self) -> Option<&str> {
        let (_, after) = self.target.split_once("#commit:")?;
        Some(after)
    }
}

/// A complete message: user content, one header, ordered references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub content: String,
    pub header: Header,
    pub references: Vec<Reference>,
}

/// The four post kinds of the social extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Post,
    Comment,
    Repost,
    Quote,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Post => "post",
            PostType::Comment => "comment",
            PostType::Repost => "repost",
            PostType::Quote => "quote",
        }
    }
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Parsing ────────────────────────────────────────────────────────

/// Collect `key="value"` tokens in document order.
fn parse_fields(raw: &str) -> Vec<(String, String)> {
    FIELD_RE
        .captures_iter(raw)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

/// Take a required key out of the field list, preserving the order of the rest.
fn take_field(fields: &mut Vec<(String, String)>, name: &str) -> Option<String> {
    let idx = fields.iter().position(|(n, _)| n == name)?;
    Some(fields.remove(idx).1)
}

/// Parse a `--- GitMsg: … ---` line. Returns `None` on missing delimiters
/// or a missing `ext`/`v`/`ext-v`.
pub fn parse_header(line: &str) -> Option<Header> {
    let captures = HEADER_LINE_RE.captures(line.trim())?;
    let mut fields = parse_fields(&captures[1]);

    let ext = take_field(&mut fields, "ext")?;
    let version = take_field(&mut fields, "v")?;
    let ext_version = take_field(&mut fields, "ext-v")?;

    Some(Header { ext, version, ext_version, fields })
}

/// Parse one reference section: the `--- GitMsg-Ref: … ---` line plus any
/// following metadata lines. Returns `None` if a required field is missing.
pub fn parse_ref(section: &str) -> Option<Reference> {
    let mut lines = section.lines();
    let first = lines.next()?;
    let captures = REF_LINE_RE.captures(first.trim())?;
    let mut fields = parse_fields(&captures[1]);

    let ext = take_field(&mut fields, "ext")?;
    let target = take_field(&mut fields, "ref")?;
    let version = take_field(&mut fields, "v")?;
    let ext_version = take_field(&mut fields, "ext-v")?;
    let author = take_field(&mut fields, "author")?;
    let email = take_field(&mut fields, "email")?;
    let time = take_field(&mut fields, "time")?;

    let metadata_text = lines.collect::<Vec<_>>().join("\n");
    let metadata_text = metadata_text.trim();
    let metadata = if metadata_text.is_empty() {
        None
    } else {
        Some(metadata_text.to_string())
    };

    Some(Reference {
        ext,
        author,
        email,
        time,
        target,
        version,
        ext_version,
        fields,
        metadata,
    })
}

/// Parse a complete message from raw commit-message text.
///
/// The first line matching the header anchor splits the text: everything
/// before it is user content (trimmed), everything after is scanned for
/// reference sections in order. Returns `None` when no header is found.
pub fn parse_message(text: &str) -> Option<Message> {
    let lines: Vec<&str> = text.lines().collect();
    let header_idx = lines.iter().position(|l| HEADER_LINE_RE.is_match(l.trim()))?;

    let header = parse_header(lines[header_idx])?;
    let content = lines[..header_idx].join("\n").trim().to_string();

    // Split the tail into sections, each starting at a GitMsg-Ref line and
    // running to the next one (metadata terminates at the next section).
    let mut references = Vec::new();
    let mut section: Option<Vec<&str>> = None;
    for line in &lines[header_idx + 1..] {
        if REF_LINE_RE.is_match(line.trim()) {
            if let Some(prev) = section.take() {
                references.extend(parse_ref(&prev.join("\n")));
            }
            section = Some(vec![line]);
        } else if let Some(current) = section.as_mut() {
            current.push(line);
        }
    }
    if let Some(last) = section {
        references.extend(parse_ref(&last.join("\n")));
    }

    Some(Message { content, header, references })
}

// ─── Formatting ─────────────────────────────────────────────────────

/// Emit the canonical header line: `ext` first, extension fields in
/// insertion order, then `v` and `ext-v`.
pub fn format_header(header: &Header) -> String {
    let mut tokens = Vec::with_capacity(header.fields.len() + 3);
    tokens.push(format!("ext=\"{}\"", header.ext));
    for (name, value) in &header.fields {
        tokens.push(format!("{}=\"{}\"", name, value));
    }
    tokens.push(format!("v=\"{}\"", header.version));
    tokens.push(format!("ext-v=\"{}\"", header.ext_version));

    format!("--- GitMsg: {} ---", tokens.join("; "))
}

/// Emit a reference section; writer order is `ext, author, email, time,
/// <ext-fields>, ref, v, ext-v`, metadata body appended when present.
pub fn format_ref(reference: &Reference) -> String {
    let mut tokens = Vec::with_capacity(reference.fields.len() + 7);
    tokens.push(format!("ext=\"{}\"", reference.ext));
    tokens.push(format!("author=\"{}\"", reference.author));
    tokens.push(format!("email=\"{}\"", reference.email));
    tokens.push(format!("time=\"{}\"", reference.time));
    for (name, value) in &reference.fields {
        tokens.push(format!("{}=\"{}\"", name, value));
    }
    tokens.push(format!("ref=\"{}\"", reference.target));
    tokens.push(format!("v=\"{}\"", reference.version));
    tokens.push(format!("ext-v=\"{}\"", reference.ext_version));

    let line = format!("--- GitMsg-Ref: {} ---", tokens.join("; "));
    match &reference.metadata {
        Some(metadata) => format!("{}\n{}", line, metadata),
        None => line,
    }
}

/// Emit the canonical message envelope: trimmed content, blank line,
/// header line, then each reference section separated by blank lines.
pub fn format_message(message: &Message) -> String {
    let mut parts = Vec::with_capacity(message.references.len() + 2);
    let content = message.content.trim();
    if !content.is_empty() {
        parts.push(content.to_string());
    }
    parts.push(format_header(&message.header));
    for reference in &message.references {
        parts.push(format_ref(reference));
    }
    parts.join("\n\n")
}

// ─── Validation ─────────────────────────────────────────────────────

/// Validate extension names, versions, and reference targets. Total on
/// all parser outputs.
pub fn validate(message: &Message) -> bool {
    if !EXT_RE.is_match(&message.header.ext) {
        return false;
    }
    if !VERSION_RE.is_match(&message.header.version)
        || !VERSION_RE.is_match(&message.header.ext_version)
    {
        return false;
    }

    message.references.iter().all(|r| {
        EXT_RE.is_match(&r.ext)
            && REF_TARGET_RE.is_match(&r.target)
            && VERSION_RE.is_match(&r.version)
            && VERSION_RE.is_match(&r.ext_version)
    })
}

// ─── Derived views ──────────────────────────────────────────────────

/// Strip the header line and every reference section from raw text,
/// returning the trimmed remainder. Robust against text that never
/// parsed as a message.
pub fn clean_content(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut in_ref_sections = false;

    for line in text.lines() {
        if REF_LINE_RE.is_match(line.trim()) {
            // Sections run to the next section or end of input; once one
            // starts, nothing after is user content.
            in_ref_sections = true;
            continue;
        }
        if in_ref_sections || HEADER_LINE_RE.is_match(line.trim()) {
            continue;
        }
        kept.push(line);
    }

    kept.join("\n").trim().to_string()
}

/// Post type of a parsed message (or its absence). Implicit posts,
/// foreign extensions, and unknown `type` values are plain posts.
pub fn post_type(message: Option<&Message>) -> PostType {
    let Some(message) = message else {
        return PostType::Post;
    };
    if message.header.ext != SOCIAL_EXT {
        return PostType::Post;
    }
    match message.header.field("type") {
        Some("comment") => PostType::Comment,
        Some("repost") => PostType::Repost,
        Some("quote") => PostType::Quote,
        _ => PostType::Post,
    }
}

/// An empty repost carries only the single attribution line `#commit:<hash>`.
/// The "single line beginning with `#`" heuristic is part of the protocol
/// contract.
pub fn is_empty_repost(message: &Message) -> bool {
    if post_type(Some(message)) != PostType::Repost {
        return false;
    }
    let content = message.content.trim();
    content.starts_with('#') && !content.contains('\n')
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
