//! Domain models for mail entities

mod label;
mod message;
mod page;
mod thread;

pub use label::{Label, LabelChange, LabelId};
pub use message::{EmailAddress, Message, MessageId};
pub use page::{PageRequest, PageResult};
pub use thread::{ThreadId, ThreadSummary};
