//! Tower layers used by the default transport stack

mod user_agent;

pub use user_agent::{UserAgentLayer, UserAgentService};
