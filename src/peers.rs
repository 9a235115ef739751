//! Who must hear about subscription changes made to *other* users.
//!
//! Pure functions: callers load the realm's users and the subscriber sets as
//! they were before the change, and get back addressed notices.

use crate::db::DbUser;
use crate::events::Notice;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use subcast_schema::{Event, RealmUserEvent, SubscriptionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerOp {
    Add,
    Remove,
}

/// One stream touched by a bulk add or remove.
#[derive(Debug, Clone)]
pub struct StreamChange {
    pub stream_id: i64,
    /// Public or web-public.
    pub is_public: bool,
    /// Users subscribed or unsubscribed by this change.
    pub altered: BTreeSet<i64>,
    /// Active subscribers before the change.
    pub subscribers_before: BTreeSet<i64>,
}

fn peer_event(op: PeerOp, stream_ids: Vec<i64>, user_ids: Vec<i64>) -> Event {
    Event::Subscription(match op {
        PeerOp::Add => SubscriptionEvent::PeerAdd {
            stream_ids,
            user_ids,
        },
        PeerOp::Remove => SubscriptionEvent::PeerRemove {
            stream_ids,
            user_ids,
        },
    })
}

/// Users entitled to the subscriber list of `change`'s stream, minus the
/// altered users themselves.
fn peers_of(change: &StreamChange, members: &[DbUser]) -> BTreeSet<i64> {
    let mut peers: BTreeSet<i64> = if change.is_public {
        members
            .iter()
            .filter(|user| user.is_active)
            .filter(|user| !user.is_guest() || change.subscribers_before.contains(&user.id))
            .map(|user| user.id)
            .collect()
    } else {
        change.subscribers_before.clone()
    };
    for altered in &change.altered {
        peers.remove(altered);
    }
    peers
}

/// Builds the `peer_add` / `peer_remove` notices for a bulk change.
///
/// Public streams with exactly one altered user are collapsed per
/// (user, peer set): one notice listing every such stream. Everything else
/// gets one notice per stream.
pub fn peer_events(
    realm_id: i64,
    op: PeerOp,
    members: &[DbUser],
    changes: &[StreamChange],
) -> Vec<Notice> {
    let mut notices = Vec::new();
    let mut collapsed: BTreeMap<(i64, Vec<i64>), Vec<i64>> = BTreeMap::new();

    for change in changes {
        if change.altered.is_empty() {
            continue;
        }
        let peers = peers_of(change, members);
        if peers.is_empty() {
            continue;
        }

        if change.is_public && change.altered.len() == 1 {
            if let Some(&user_id) = change.altered.first() {
                collapsed
                    .entry((user_id, peers.into_iter().collect()))
                    .or_default()
                    .push(change.stream_id);
                continue;
            }
        }

        notices.push(Notice {
            realm_id,
            event: peer_event(
                op,
                vec![change.stream_id],
                change.altered.iter().copied().collect(),
            ),
            users: peers.into_iter().collect(),
        });
    }

    for ((user_id, peers), mut stream_ids) in collapsed {
        stream_ids.sort_unstable();
        stream_ids.dedup();
        notices.push(Notice {
            realm_id,
            event: peer_event(op, stream_ids, vec![user_id]),
            users: peers,
        });
    }
    notices
}

/// `realm_user` add/remove notices for a guest whose set of accessible users
/// went from `before` to `after`.
pub fn visibility_changes(
    realm_id: i64,
    guest_id: i64,
    members: &HashMap<i64, DbUser>,
    before: &BTreeSet<i64>,
    after: &BTreeSet<i64>,
) -> Vec<Notice> {
    let mut notices = Vec::new();
    for user_id in after.difference(before) {
        if let Some(user) = members.get(user_id) {
            notices.push(Notice {
                realm_id,
                event: Event::RealmUser(RealmUserEvent::Add {
                    person: user.person(),
                }),
                users: vec![guest_id],
            });
        }
    }
    for user_id in before.difference(after) {
        if let Some(user) = members.get(user_id) {
            notices.push(Notice {
                realm_id,
                event: Event::RealmUser(RealmUserEvent::Remove {
                    person: user.removed_person(),
                }),
                users: vec![guest_id],
            });
        }
    }
    notices
}
