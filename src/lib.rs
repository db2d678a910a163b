pub mod adapters;
pub mod channel;
pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod recovery;
pub mod store;

pub use adapters::PostgresStore;
pub use channel::{InMemoryChannel, MessageChannel, PgMessageChannel, PublishedMessage};
pub use config::AppConfig;
pub use convert::{
    ConversionKey, ConversionService, Converter, ConverterRegistry, MediaType, Payload, TypeTag,
    TypedValue,
};
pub use error::{RedriveError, Result};
pub use recovery::{
    DeadLetterService, DeadLetterStore, ErrorContext, InMemoryDeadLetterStore, PgDeadLetterStore,
    ReplayReport,
};
pub use store::{DocumentStore, InMemoryDocumentStore, PgDocumentStore};
