use std::{collections::HashSet, time::Duration};

use rand::{Rng, seq::IndexedRandom};

use crate::types::Track;

/// Joins scopes with spaces, keeping each distinct scope once in order of first
/// appearance. Blank entries are dropped.
pub fn join_scopes<S: AsRef<str>>(scopes: &[S]) -> String {
    let mut seen = HashSet::new();
    scopes
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty() && seen.insert(*s))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Delay between two firings of the refresh cycle: half the token lifetime,
/// never less than one second.
pub fn refresh_interval(expires_in: u64) -> Duration {
    Duration::from_secs((expires_in / 2).max(1))
}

/// Removes tracks whose id was already seen, keeping the first occurrence.
pub fn dedup_tracks(tracks: Vec<Track>) -> Vec<Track> {
    let mut seen = HashSet::new();
    tracks
        .into_iter()
        .filter(|t| seen.insert(t.id.clone()))
        .collect()
}

/// Removes duplicate strings, keeping the first occurrence.
pub fn dedup_uris(uris: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    uris.iter()
        .filter(|u| !u.trim().is_empty() && seen.insert(u.as_str()))
        .cloned()
        .collect()
}

/// Picks up to `amount` distinct tracks at random.
///
/// The input is deduplicated first, so the result never holds the same track
/// twice even when the search returned it on several positions.
pub fn sample_tracks<R: Rng + ?Sized>(tracks: Vec<Track>, amount: usize, rng: &mut R) -> Vec<Track> {
    let unique = dedup_tracks(tracks);
    unique.choose_multiple(rng, amount).cloned().collect()
}
