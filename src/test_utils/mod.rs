#![allow(missing_docs)]

pub(crate) mod extractor;
pub(crate) mod http;
pub(crate) mod store;

pub(crate) use extractor::{CannedExtractor, PendingExtractor};
pub(crate) use http::{MultipartFile, must_make_multipart, read_json};
pub(crate) use store::{FailingStore, must_make_store, stored_files};
