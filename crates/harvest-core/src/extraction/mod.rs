//! Table extraction: page text resolution, prompting, reply parsing and
//! row merging.

pub mod invoker;
pub mod merger;
pub mod parser;
pub mod prompt;
pub mod resolver;
pub mod serializer;

pub use invoker::{ChatCompletionsClient, ModelInvoker};
pub use merger::{extract_table, run_extraction, ProgressFn, TableMerger};
pub use parser::{parse_rows, strip_fences};
pub use prompt::{build_prompt, PagePrompt, EMPTY_PAGE_NOTICE};
pub use resolver::{PageSource, PageTextResolver, SelectionPolicy, TextSource};
pub use serializer::serialize_rows;
