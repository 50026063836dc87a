use crate::models::Match;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewLine {
    pub line_no: Option<i64>,
    pub text: String,
    pub is_match: bool,
}

/// Up to `context` lines either side of the match. Falls back to the stored
/// line when the file is gone, unreadable, or shorter than it used to be.
pub async fn preview(matched: &Match, context: usize) -> Vec<PreviewLine> {
    let fallback = || {
        vec![PreviewLine {
            line_no: matched.line_no,
            text: matched.line.clone(),
            is_match: true,
        }]
    };

    let Some(line_no) = matched.line_no.filter(|n| *n > 0) else {
        return fallback();
    };

    let content = match tokio::fs::read_to_string(&matched.file_path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!(path = %matched.file_path, error = %e, "preview falls back to stored line");
            return fallback();
        }
    };

    let lines = context_lines(&content, line_no as usize, context);
    if lines.is_empty() {
        fallback()
    } else {
        lines
    }
}

fn context_lines(content: &str, line_no: usize, context: usize) -> Vec<PreviewLine> {
    let lines: Vec<&str> = content.lines().collect();
    if line_no > lines.len() {
        return Vec::new();
    }

    let idx = line_no - 1;
    let start = idx.saturating_sub(context);
    let end = (idx + context + 1).min(lines.len());

    (start..end)
        .map(|i| PreviewLine {
            line_no: Some(i as i64 + 1),
            text: lines[i].to_string(),
            is_match: i == idx,
        })
        .collect()
}
