//! Trailer block detection.
//!
//! The trailer block is the last paragraph of the message, provided it is not
//! the title and looks like trailers: either every line is a `token: value`
//! trailer, or it contains at least one git-generated line
//! (`Signed-off-by: `, `(cherry picked from commit `) and at least a quarter
//! of its lines are trailers. Lines starting with whitespace continue the
//! previous trailer. Anything after a `---` divider is ignored.

use super::TrailerParser;

/// lines git itself appends, which always qualify a block as trailers
const GIT_GENERATED_PREFIXES: &[&str] = &["Signed-off-by: ", "(cherry picked from commit "];

/// Default [`TrailerParser`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TrailerBlock;

impl TrailerBlock {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LineKind {
    Trailer,
    GitGenerated,
    Continuation,
    Other,
}

fn classify(line: &str) -> LineKind {
    if GIT_GENERATED_PREFIXES.iter().any(|p| line.starts_with(p)) {
        return LineKind::GitGenerated;
    }
    if line.starts_with(' ') || line.starts_with('\t') {
        return LineKind::Continuation;
    }
    match line.split_once(':') {
        Some((token, _)) if is_token(token.trim_end()) => LineKind::Trailer,
        _ => LineKind::Other,
    }
}

fn is_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// message body without a patch part introduced by `---`
fn strip_divider(message: &str) -> &str {
    let mut offset = 0;
    for line in message.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);
        if bare == "---" || bare.starts_with("--- ") {
            return &message[..offset];
        }
        offset += line.len();
    }
    message
}

impl TrailerParser for TrailerBlock {
    fn trailers(&self, message: &str) -> Vec<String> {
        let lines: Vec<&str> = strip_divider(message)
            .lines()
            .map(|l| l.trim_end())
            .filter(|l| !l.starts_with('#'))
            .collect();

        let end = match lines.iter().rposition(|l| !l.is_empty()) {
            Some(last) => last + 1,
            None => return Vec::new(),
        };
        let start = match lines[..end].iter().rposition(|l| l.is_empty()) {
            Some(blank) => blank + 1,
            // a single paragraph is the title
            None => return Vec::new(),
        };
        if lines[..start].iter().all(|l| l.is_empty()) {
            return Vec::new();
        }

        let paragraph = &lines[start..end];
        let kinds: Vec<LineKind> = paragraph.iter().map(|l| classify(l)).collect();

        let trailers = kinds
            .iter()
            .filter(|k| matches!(k, LineKind::Trailer | LineKind::GitGenerated))
            .count();
        let others = kinds.iter().filter(|k| **k == LineKind::Other).count();
        let generated = kinds.contains(&LineKind::GitGenerated);

        let is_block = trailers > 0 && (others == 0 || (generated && trailers * 3 >= others));
        if !is_block {
            return Vec::new();
        }

        let mut out: Vec<String> = Vec::new();
        for (line, kind) in paragraph.iter().zip(kinds) {
            match kind {
                LineKind::Continuation => match out.last_mut() {
                    Some(prev) => {
                        prev.push(' ');
                        prev.push_str(line.trim_start());
                    }
                    None => out.push(line.trim_start().to_string()),
                },
                _ => out.push(line.to_string()),
            }
        }
        out
    }
}
