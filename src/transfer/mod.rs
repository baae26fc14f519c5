//! Streaming transfer progress.
//!
//! Bytes from the transfer endpoint flow through four stages:
//!
//! 1. [`LineFramer`] splits the body into newline-delimited lines
//! 2. [`EventParser`] turns each line into a [`TransferEvent`], skipping junk
//! 3. [`reduce`] folds events into a [`TransferState`]
//! 4. [`SessionRegistry`] publishes each new state to the shared cache
//!
//! Only the last stage touches I/O; the first three are pure and tested in
//! isolation.

pub mod events;
pub mod framer;
pub mod parser;
pub mod reducer;
pub mod session;
pub mod types;

pub use events::{EventParseError, TransferEvent};
pub use framer::{frame_lines, LineFramer, DEFAULT_MAX_LINE_BYTES};
pub use parser::{parse_event_line, EventParser};
pub use reducer::{reduce, reduce_all};
pub use session::{SessionRegistry, TransferHandle};
pub use types::{
    percent_of, DownloadRequestBody, TransferIdentity, TransferRequest, TransferState,
    TransferStatus,
};
