//! Event fan-out: who gets told about a committed change, and through which
//! queue shard.

pub mod dispatcher;

pub use dispatcher::EventDispatcher;

use subcast_schema::Event;

/// An event addressed to a set of users of one realm.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub realm_id: i64,
    pub event: Event,
    pub users: Vec<i64>,
}
