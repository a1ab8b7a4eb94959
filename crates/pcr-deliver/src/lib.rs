mod config;
pub use config::{CollectorConfig, USER_AGENT};

mod errors;
pub use errors::{DeliveryError, IngestError, SpoolError};

mod format;
pub use format::{ResultLine, sort_lines};

mod ingest;
pub use ingest::ExternalIngestor;

mod transport;
pub use transport::{HttpTransport, Transport};

mod poster;
pub use poster::{DeliveryOutcome, Poster};

mod spool;
pub use spool::FailureSpool;
