mod view;
pub use view::{log_event, message_for};

mod journal;
pub use journal::Journal;
