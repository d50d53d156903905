pub mod sink;

pub use sink::{SlackConfig, SlackSink};
