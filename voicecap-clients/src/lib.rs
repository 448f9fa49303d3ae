//! External collaborators of the core: BlobStore, Transcoder, SpeechClient,
//! SummaryClient, and Mailer (spec §4.B, §4.G–J).

pub mod blobstore;
pub mod mailer;
pub mod speech_client;
pub mod summary_client;
pub mod transcoder;

pub use blobstore::{BlobStore, BlobStoreError};
pub use mailer::{Mailer, MailerError};
pub use speech_client::{SpeechClient, SpeechClientError};
pub use summary_client::{SummaryClient, SummaryClientError, SummaryResult};
pub use transcoder::{Transcoder, TranscoderError};
