mod error;
mod header;
mod request;
mod response;

pub use error::{Error, Result};
pub use header::{HeaderStore, PEER_IP_KEY};
pub use request::FetchRequest;
pub use response::FetchResult;

pub(crate) use response::{parse_headers, parse_status_line, read_body, SourceBuf, BUFFER_SIZE};
