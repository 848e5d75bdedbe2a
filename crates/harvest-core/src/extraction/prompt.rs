//! Per-page prompt construction.

use serde::Serialize;

use crate::models::table::OutputFormat;

/// Notice sent in place of page text when a page yielded nothing.
pub const EMPTY_PAGE_NOTICE: &str =
    "[This page appears to be empty or contains only images/graphics with no extractable text.]";

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// The request sent to the model for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePrompt {
    /// One-based page number the prompt describes.
    pub page: u32,
    /// Whether this page is asked to emit the header row.
    pub include_header: bool,
    /// System instructions followed by the page message.
    pub messages: Vec<Message>,
}

/// Fixed instructions, identical for every page of every run.
fn system_instructions(format: OutputFormat) -> String {
    format!(
        "You are a precise data extraction assistant. \
         Use only the provided PDF page content. \
         Return results in {format} format. \
         Include a column named page_number as the first column. \
         If include_header is 'yes', include a header row. \
         If include_header is 'no', do not include a header row. \
         Use a consistent column order and field format on every page. \
         Extract all data that matches the user request; do not omit fields. \
         Do not wrap the output in code fences. \
         If something is not present on that page, respond with 'Not found'.",
        format = format.token()
    )
}

/// Page context block: the page label followed by its text or the empty notice.
pub fn page_context(page: u32, text: &str) -> String {
    if text.trim().is_empty() {
        format!("[Page {}]\n{}", page, EMPTY_PAGE_NOTICE)
    } else {
        format!("[Page {}]\n{}", page, text)
    }
}

/// Build the prompt for one page.
pub fn build_prompt(
    intent: &str,
    page: u32,
    page_text: &str,
    format: OutputFormat,
    include_header: bool,
) -> PagePrompt {
    let user = format!(
        "User request: {}\n\ninclude_header: {}\n\nPDF page content:\n{}",
        intent,
        if include_header { "yes" } else { "no" },
        page_context(page, page_text)
    );

    PagePrompt {
        page,
        include_header,
        messages: vec![
            Message {
                role: Role::System,
                content: system_instructions(format),
            },
            Message {
                role: Role::User,
                content: user,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_prompt_shape() {
        let prompt = build_prompt("get totals", 3, "Total: 10", OutputFormat::Tsv, true);
        assert_eq!(prompt.messages.len(), 2);
        assert_eq!(prompt.messages[0].role, Role::System);
        assert!(prompt.messages[0].content.contains("in TSV format"));
        assert!(prompt.messages[0].content.contains("page_number as the first column"));
        assert!(prompt.messages[0].content.contains("'Not found'"));
        assert_eq!(
            prompt.messages[1].content,
            "User request: get totals\n\ninclude_header: yes\n\nPDF page content:\n[Page 3]\nTotal: 10"
        );
    }

    #[test]
    fn test_empty_page_notice() {
        let prompt = build_prompt("q", 7, "   ", OutputFormat::Csv, false);
        let user = &prompt.messages[1].content;
        assert!(user.contains("include_header: no"));
        assert!(user.ends_with(&format!("[Page 7]\n{}", EMPTY_PAGE_NOTICE)));
    }

    #[test]
    fn test_system_instructions_stable_across_pages() {
        let first = build_prompt("q", 1, "a", OutputFormat::Csv, true);
        let later = build_prompt("q", 9, "b", OutputFormat::Csv, false);
        assert_eq!(first.messages[0], later.messages[0]);
    }
}
