pub mod embedder;
pub mod features;
pub mod mspace;
pub mod qspace;
pub mod stack;

/// Dimension of the shared Z-space both encoders project into.
pub const LATENT_DIM: usize = 128;

pub use embedder::{EMBEDDING_DIM, Embedder, MiniLmEmbedder};
pub use features::{FEATURE_DIM, QueryFeatures, tenant_preference};
pub use mspace::MSpaceEncoder;
pub use qspace::{EncodedQuery, QSpaceEncoder};
pub use stack::EncoderStack;
