//! Event extraction from post text
//!
//! The harvester treats extraction as a pluggable, stateless step: anything
//! implementing [`EventDeriver`] can be handed to the coordinator. The
//! default [`HeuristicDeriver`] recognises announcement posts by hint
//! hashtags and words, splits digest posts into one event per link, and
//! pulls a title, start time, location and registration link out of
//! single announcements. It is best-effort by nature.

mod dates;
mod heuristics;

pub use dates::{moscow_offset, parse_start_datetime};
pub use heuristics::HeuristicDeriver;

/// Hint words, digest predicates and fallback titles used by [`HeuristicDeriver`]
pub use crate::config::HeuristicsConfig as HintConfig;

use crate::model::{Event, Post};

/// Maps one post to the events it announces
pub trait EventDeriver: Send + Sync {
    /// Returns true if the post looks like it announces something
    fn is_eventish(&self, post: &Post) -> bool;

    /// Derives zero or more events from a post
    ///
    /// Must be deterministic: deriving the same post twice yields events
    /// with the same keys.
    fn derive(&self, post: &Post) -> Vec<Event>;
}
