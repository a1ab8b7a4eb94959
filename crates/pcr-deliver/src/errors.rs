use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("http request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("collector rejected post: http {status}")]
    Rejected { status: u16 },
}

#[derive(Error, Debug)]
pub enum SpoolError {
    #[error("failed to read spool {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write spool {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to list result dir {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
