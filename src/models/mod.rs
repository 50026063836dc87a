mod flow;
mod history;
mod matches;
mod note;
mod session;

pub use flow::Flow;
pub use history::{FlowHistory, FlowHistoryEntry};
pub use matches::{FlowMatch, FlowStep, Match, NewMatch};
pub use note::MatchNote;
pub use session::{ActiveFlow, SessionContext};
