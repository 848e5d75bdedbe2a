//! Page loop: resolve, prompt, invoke, parse, merge.

use std::path::Path;

use tracing::{debug, info, warn};

use super::invoker::ModelInvoker;
use super::parser::parse_rows;
use super::prompt::build_prompt;
use super::resolver::{PageSource, PageTextResolver};
use crate::error::ExtractionError;
use crate::models::config::HarvestConfig;
use crate::models::table::{is_header_row, ExtractionOutcome, ExtractionRequest, Row};

/// Progress callback: completed fraction in `[0, 1]` and a status message.
pub type ProgressFn<'a> = dyn FnMut(f64, &str) + 'a;

/// Accumulates parsed rows from successive pages under one header.
#[derive(Debug, Default)]
pub struct TableMerger {
    header: Option<Row>,
    rows: Vec<Row>,
    extracted_pages: usize,
}

impl TableMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a header row has been fixed.
    pub fn has_header(&self) -> bool {
        self.header.is_some()
    }

    /// Add one page's parsed rows.
    ///
    /// The first header-looking row becomes the table header. Later rows
    /// equal to it are dropped. Every other row gets its first cell
    /// replaced by `page`. Returns whether the page contributed a data row.
    pub fn merge_page(&mut self, page: u32, rows: Vec<Row>) -> bool {
        let mut contributed = false;

        for mut row in rows {
            if row.is_empty() {
                continue;
            }
            if self.header.is_none() && is_header_row(&row) {
                self.header = Some(row.clone());
                self.rows.push(row);
                continue;
            }
            if self.header.as_ref() == Some(&row) {
                continue;
            }

            row[0] = page.to_string();
            self.rows.push(row);
            contributed = true;
        }

        if contributed {
            self.extracted_pages += 1;
        }
        contributed
    }

    /// Close the table.
    pub fn finish(self, total_pages: usize) -> ExtractionOutcome {
        ExtractionOutcome {
            rows: self.rows,
            extracted_pages: self.extracted_pages,
            total_pages,
        }
    }
}

/// Run the page loop over `source` for the pages `request` selects.
///
/// Pages are processed strictly in order, one model call each. A failed
/// model call aborts the run and discards rows gathered so far.
pub async fn extract_table<S, M>(
    source: &S,
    invoker: &M,
    request: &ExtractionRequest,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> crate::Result<ExtractionOutcome>
where
    S: PageSource + ?Sized,
    M: ModelInvoker + ?Sized,
{
    let total = request.effective_pages(source.page_count());
    if total == 0 {
        info!("No pages in range, nothing to extract");
        return Ok(ExtractionOutcome::empty(0));
    }

    info!(
        offset = request.offset,
        pages = total,
        format = %request.format,
        "Starting table extraction"
    );

    let delimiter = request.format.delimiter();
    let mut merger = TableMerger::new();

    for processed in 1..=total {
        let page_index = request.offset + processed - 1;
        let page = page_index as u32 + 1;

        let text = source.resolve(page_index);
        let prompt = build_prompt(&request.prompt, page, &text, request.format, !merger.has_header());

        let reply = invoker.invoke(&prompt).await.map_err(|err| {
            warn!("Model call failed on page {}: {}", page, err);
            ExtractionError::ModelInvocation { page, source: err }
        })?;

        let rows = parse_rows(&reply, delimiter);
        let row_count = rows.len();
        let contributed = merger.merge_page(page, rows);
        debug!(page, rows = row_count, contributed, "Page merged");

        if let Some(report) = progress.as_deref_mut() {
            report(
                processed as f64 / total as f64,
                &format!("Extracting page {}/{}", processed, total),
            );
        }
    }

    let outcome = merger.finish(total);
    info!(
        rows = outcome.rows.len(),
        extracted_pages = outcome.extracted_pages,
        total_pages = outcome.total_pages,
        "Extraction complete"
    );
    Ok(outcome)
}

/// Extract a table from the PDF at `pdf_path`.
///
/// The document is opened with the OCR engine from `config` when it is
/// enabled and its model files are present. Rendered page images live in
/// a scratch directory that is removed when the run ends, on success or
/// failure.
pub async fn run_extraction<M>(
    pdf_path: &Path,
    request: &ExtractionRequest,
    config: &HarvestConfig,
    invoker: &M,
    progress: Option<&mut ProgressFn<'_>>,
) -> crate::Result<ExtractionOutcome>
where
    M: ModelInvoker + ?Sized,
{
    info!("Opening PDF: {}", pdf_path.display());
    let resolver = PageTextResolver::open(pdf_path, config)?;
    debug!(pages = resolver.page_count(), ocr = resolver.has_ocr(), "PDF ready");

    extract_table(&resolver, invoker, request, progress).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HarvestError, ModelError};
    use crate::extraction::prompt::{PagePrompt, EMPTY_PAGE_NOTICE};
    use crate::models::table::OutputFormat;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    struct MemoryPages(Vec<String>);

    impl MemoryPages {
        fn numbered(count: usize) -> Self {
            Self((1..=count).map(|n| format!("text of page {}", n)).collect())
        }
    }

    impl PageSource for MemoryPages {
        fn page_count(&self) -> usize {
            self.0.len()
        }

        fn resolve(&self, page_index: usize) -> String {
            self.0[page_index].clone()
        }
    }

    /// Replies in order and records every prompt it was sent.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, ModelError>>>,
        prompts: Mutex<Vec<PagePrompt>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String, ModelError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn ok(replies: &[&str]) -> Self {
            Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
        }

        fn prompts(&self) -> Vec<PagePrompt> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelInvoker for ScriptedModel {
        async fn invoke(&self, prompt: &PagePrompt) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(prompt.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    #[test]
    fn test_merge_fixes_first_header() {
        let mut merger = TableMerger::new();
        assert!(merger.merge_page(1, vec![row(&["page_number", "v"]), row(&["9", "a"])]));
        assert!(merger.merge_page(2, vec![row(&["page_number", "v"]), row(&["x", "b"])]));

        let outcome = merger.finish(2);
        assert_eq!(
            outcome.rows,
            vec![row(&["page_number", "v"]), row(&["1", "a"]), row(&["2", "b"])]
        );
        assert_eq!(outcome.extracted_pages, 2);
    }

    #[test]
    fn test_merge_header_only_page_contributes_nothing() {
        let mut merger = TableMerger::new();
        assert!(!merger.merge_page(1, vec![row(&["page_number", "v"])]));
        assert!(merger.has_header());
        assert_eq!(merger.finish(1).extracted_pages, 0);
    }

    #[test]
    fn test_merge_repeated_header_only_page_not_counted() {
        let mut merger = TableMerger::new();
        assert!(merger.merge_page(1, vec![row(&["page_number", "v"]), row(&["1", "a"])]));
        assert!(!merger.merge_page(2, vec![row(&["page_number", "v"])]));

        let outcome = merger.finish(2);
        assert_eq!(outcome.extracted_pages, 1);
        assert_eq!(outcome.rows.iter().filter(|r| r[0] == "page_number").count(), 1);
        assert_eq!(outcome.data_rows().len(), 1);
    }

    #[test]
    fn test_merge_without_header() {
        let mut merger = TableMerger::new();
        merger.merge_page(4, vec![row(&["1", "a"]), row(&["1", "b"])]);
        let outcome = merger.finish(1);
        assert_eq!(outcome.rows, vec![row(&["4", "a"]), row(&["4", "b"])]);
        assert_eq!(outcome.header(), None);
    }

    #[test]
    fn test_merge_rewrites_mismatched_header_like_rows() {
        let mut merger = TableMerger::new();
        merger.merge_page(1, vec![row(&["page_number", "a"])]);
        merger.merge_page(2, vec![row(&["page_number", "a", "extra"])]);
        let outcome = merger.finish(2);
        assert_eq!(outcome.rows[1], row(&["2", "a", "extra"]));
    }

    #[tokio::test]
    async fn test_every_page_contributes() {
        let pages = MemoryPages::numbered(3);
        let model = ScriptedModel::ok(&["page_number,val\n1,a", "1,b", "1,c"]);
        let request = ExtractionRequest::new("values");

        let outcome = extract_table(&pages, &model, &request, None).await.unwrap();

        assert_eq!(
            outcome.rows,
            vec![
                row(&["page_number", "val"]),
                row(&["1", "a"]),
                row(&["2", "b"]),
                row(&["3", "c"]),
            ]
        );
        assert_eq!(outcome.extracted_pages, 3);
        assert_eq!(outcome.total_pages, 3);
        assert_eq!(
            outcome.serialize(OutputFormat::Csv).unwrap(),
            "page_number,val\n1,a\n2,b\n3,c"
        );
    }

    #[tokio::test]
    async fn test_header_only_page_adds_no_page_or_header() {
        let pages = MemoryPages::numbered(2);
        let model = ScriptedModel::ok(&["page_number,v\n1,a", "page_number,v"]);
        let request = ExtractionRequest::new("values");

        let outcome = extract_table(&pages, &model, &request, None).await.unwrap();

        assert_eq!(outcome.rows, vec![row(&["page_number", "v"]), row(&["1", "a"])]);
        assert_eq!(outcome.extracted_pages, 1);
        assert_eq!(outcome.total_pages, 2);
    }

    #[tokio::test]
    async fn test_offset_and_limit_select_pages() {
        let pages = MemoryPages::numbered(5);
        let model = ScriptedModel::ok(&["page_number,v\n1,x"]);
        let request = ExtractionRequest::new("q").with_offset(2).with_limit(Some(1));

        let outcome = extract_table(&pages, &model, &request, None).await.unwrap();

        assert_eq!(outcome.rows, vec![row(&["page_number", "v"]), row(&["3", "x"])]);
        assert_eq!(outcome.total_pages, 1);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].page, 3);
        assert!(prompts[0].messages[1].content.contains("[Page 3]\ntext of page 3"));
    }

    #[tokio::test]
    async fn test_limit_clamped_to_remaining_pages() {
        let pages = MemoryPages::numbered(5);
        let model = ScriptedModel::ok(&[]);
        let request = ExtractionRequest::new("q").with_offset(3).with_limit(Some(10));

        let outcome = extract_table(&pages, &model, &request, None).await.unwrap();

        assert_eq!(model.prompts().len(), 2);
        assert_eq!(outcome.total_pages, 2);
    }

    #[tokio::test]
    async fn test_empty_replies_give_empty_outcome() {
        let pages = MemoryPages::numbered(2);
        let model = ScriptedModel::ok(&["", "```csv\n```"]);
        let request = ExtractionRequest::new("q");

        let outcome = extract_table(&pages, &model, &request, None).await.unwrap();

        assert!(outcome.is_empty());
        assert_eq!(outcome.extracted_pages, 0);
        assert_eq!(outcome.total_pages, 2);
    }

    #[tokio::test]
    async fn test_model_failure_aborts_run() {
        let pages = MemoryPages::numbered(3);
        let model = ScriptedModel::new(vec![
            Ok("page_number,v\n1,a".to_string()),
            Err(ModelError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            }),
        ]);
        let request = ExtractionRequest::new("q");

        let err = extract_table(&pages, &model, &request, None).await.unwrap_err();

        match err {
            HarvestError::Extraction(ExtractionError::ModelInvocation { page, .. }) => assert_eq!(page, 2),
            other => panic!("unexpected error: {other}"),
        }
        // page 3 is never attempted
        assert_eq!(model.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_nothing_in_range_makes_no_calls() {
        let model = ScriptedModel::ok(&["page_number,v\n1,a"]);

        let empty = MemoryPages(Vec::new());
        let outcome = extract_table(&empty, &model, &ExtractionRequest::new("q"), None)
            .await
            .unwrap();
        assert_eq!(outcome, ExtractionOutcome::empty(0));

        let pages = MemoryPages::numbered(2);
        let past_end = ExtractionRequest::new("q").with_offset(2);
        assert!(extract_table(&pages, &model, &past_end, None).await.unwrap().is_empty());

        let zero = ExtractionRequest::new("q").with_limit(Some(0));
        assert!(extract_table(&pages, &model, &zero, None).await.unwrap().is_empty());

        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_header_requested_until_fixed() {
        let pages = MemoryPages::numbered(3);
        let model = ScriptedModel::ok(&["", "page_number,v\n1,a", "1,b"]);
        let request = ExtractionRequest::new("q");

        extract_table(&pages, &model, &request, None).await.unwrap();

        let flags: Vec<bool> = model.prompts().iter().map(|p| p.include_header).collect();
        assert_eq!(flags, vec![true, true, false]);
    }

    #[tokio::test]
    async fn test_empty_page_sends_notice() {
        let pages = MemoryPages(vec!["   ".to_string()]);
        let model = ScriptedModel::ok(&["Not found"]);

        extract_table(&pages, &model, &ExtractionRequest::new("q"), None)
            .await
            .unwrap();

        assert!(model.prompts()[0].messages[1].content.ends_with(EMPTY_PAGE_NOTICE));
    }

    #[tokio::test]
    async fn test_progress_reported_after_each_page() {
        let pages = MemoryPages::numbered(4);
        let model = ScriptedModel::ok(&[]);
        let request = ExtractionRequest::new("q");

        let mut seen: Vec<(f64, String)> = Vec::new();
        let mut record = |fraction: f64, message: &str| seen.push((fraction, message.to_string()));
        extract_table(&pages, &model, &request, Some(&mut record))
            .await
            .unwrap();

        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], (0.25, "Extracting page 1/4".to_string()));
        assert_eq!(seen[3], (1.0, "Extracting page 4/4".to_string()));
        assert!(seen.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[tokio::test]
    async fn test_tsv_run() {
        let pages = MemoryPages::numbered(2);
        let model = ScriptedModel::ok(&["```tsv\npage_number\tval\n1\tdata\n```", "7\tmore"]);
        let request = ExtractionRequest::new("q").with_format(OutputFormat::Tsv);

        let outcome = extract_table(&pages, &model, &request, None).await.unwrap();

        assert_eq!(
            outcome.serialize(OutputFormat::Tsv).unwrap(),
            "page_number\tval\n1\tdata\n2\tmore"
        );
        assert!(model.prompts()[0].messages[0].content.contains("TSV format"));
    }
}
