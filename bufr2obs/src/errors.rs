use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A handler that writes report fields was dispatched without a
    /// record to write into. This guards against misuse of the dispatch
    /// layer, not against malformed input.
    #[error("Descriptor group {0:02} requires a report record")]
    RecordRequired(u8),
}

pub type Result<T> = std::result::Result<T, Error>;
