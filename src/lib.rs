pub mod batch;
pub mod config;
pub mod error;
pub mod excel;
pub mod extract;
pub mod remarks;
pub mod table;
pub mod types;

pub use batch::{process_batch, process_batch_parallel, process_outcome, BatchResults, OcrOutcome};
pub use config::Config;
pub use error::{Error, ExtractionError, Result};
pub use extract::extract;
pub use remarks::parse_remarks;
pub use types::{BankInfo, InvoiceRecord, LineItem, NormalizedInvoice, ProcessingStatus};
