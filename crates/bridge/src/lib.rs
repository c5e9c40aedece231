pub mod agent;
pub mod modal;
pub mod page;
pub mod template;

pub use agent::{InsertAgent, InsertError, InsertOutcome, MessagePort, VariablePrompter};
pub use modal::VariableModal;
pub use page::{detect_site, PageDom};
pub use template::{substitute, with_custom_instructions, INSTRUCTION_DELIMITER};
