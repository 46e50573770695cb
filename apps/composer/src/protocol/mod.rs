//! Article protocol core: a completion is split on the delimiter, validated
//! section by section, labeled against the classified intent, and retried
//! with corrective instructions until it conforms or the budget runs out.

pub mod assembler;
pub mod config;
pub mod intent;
pub mod prompts;
pub mod record;
pub mod retry;
pub mod section;
pub mod splitter;
pub mod validator;

pub use assembler::{assemble, ConversationTurn, TurnContext, TurnOutcome};
pub use config::ProtocolConfig;
pub use intent::{classify, UserIntent};
pub use record::{EntityRef, GenerationRecord};
pub use retry::{ComposedTurn, RetryController, TurnRequest};
pub use validator::ValidationStatus;
