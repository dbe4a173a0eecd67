pub mod manager;
pub mod prompts;
pub mod session;
pub mod vector;

pub use manager::{ConversationLog, MemoryManager, MemorySettings};
pub use prompts::{Decision, NO_LONG_TERM_FALLBACK, parse_decision, parse_facts};
pub use session::{ConversationSession, Role, SessionMap, TurnMessage};
pub use vector::{LONG_TERM_COLLECTION, MemoryHit, MemoryKey, QdrantMemory, VectorMemory};
