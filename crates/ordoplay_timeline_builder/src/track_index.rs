// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track lookup and batch removal by address.

use crate::path::NodePath;
use crate::timeline::TimelineStore;
use crate::track::TrackKind;

/// Find the first track with exactly `path` and `kind`.
///
/// If duplicates exist the earliest track wins.
pub fn find_track<S: TimelineStore + ?Sized>(store: &S, path: &NodePath, kind: TrackKind) -> Option<usize> {
    (0..store.track_count()).find(|&i| {
        store.track_kind(i) == Some(kind) && store.track_path(i).as_ref() == Some(path)
    })
}

/// Whether the track at `index` belongs to `path` for batch removal.
///
/// Property kinds (value, blend shape) match every property of the node at
/// `path.relation`; other kinds match the exact address.
fn matches_node<S: TimelineStore + ?Sized>(store: &S, index: usize, path: &NodePath, kind: TrackKind) -> bool {
    if store.track_kind(index) != Some(kind) {
        return false;
    }
    let Some(track_path) = store.track_path(index) else {
        return false;
    };
    if kind.requires_property() {
        track_path.is_property_of(&path.relation)
    } else {
        track_path == *path
    }
}

/// Remove every track of `kind` addressing the node at `path`.
///
/// Returns the removed indices in descending order.
pub fn remove_all_matching<S: TimelineStore + ?Sized>(
    store: &mut S,
    path: &NodePath,
    kind: TrackKind,
) -> Vec<usize> {
    let mut removed = Vec::new();
    for index in (0..store.track_count()).rev() {
        if matches_node(store, index, path, kind) {
            store.remove_track(index);
            removed.push(index);
        }
    }
    removed
}
