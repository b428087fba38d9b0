//! Recency buckets ("orbits") over the collection.
//!
//! Orbits are never stored. Every consumer, from the full layout to a single
//! orbit listing, goes through [`assign`] so they always agree.

use crate::collection_store::Track;

/// Partitions `tracks` into `orbit_count` buckets, newest first.
///
/// Tracks are sorted by `added_at` descending with a stable sort, then laid
/// out `ceil(len / orbit_count)` per orbit; any remainder ends up in the last
/// orbit. Always returns exactly `orbit_count` buckets, some possibly empty.
pub fn assign(tracks: &[Track], orbit_count: usize) -> Vec<Vec<Track>> {
    if orbit_count == 0 {
        return Vec::new();
    }

    let mut sorted = tracks.to_vec();
    sorted.sort_by(|a, b| b.added_at.cmp(&a.added_at));

    let per_orbit = sorted.len().div_ceil(orbit_count).max(1);
    let mut orbits = vec![Vec::new(); orbit_count];
    for (i, track) in sorted.into_iter().enumerate() {
        let orbit = (i / per_orbit).min(orbit_count - 1);
        orbits[orbit].push(track);
    }
    orbits
}

/// The tracks of one orbit, or `None` when `index` is out of range.
pub fn orbit_tracks(tracks: &[Track], orbit_count: usize, index: usize) -> Option<Vec<Track>> {
    assign(tracks, orbit_count).into_iter().nth(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection_store::Emotion;

    fn make_track(id: i64, added_at: i64) -> Track {
        Track {
            id,
            spotify_id: format!("t{}", id),
            source_url: String::new(),
            title: format!("t{}", id),
            artist: None,
            lyrics: None,
            lyrics_url: None,
            emotion: Emotion::Calm,
            valence: None,
            energy: None,
            tempo: None,
            genre: None,
            mood_description: None,
            dominant_instruments: None,
            vocal_characteristics: None,
            duration_ms: 0,
            thumbnail_url: None,
            preview_url: None,
            has_preview: false,
            added_at,
        }
    }

    fn ids(orbit: &[Track]) -> Vec<i64> {
        orbit.iter().map(|t| t.id).collect()
    }

    #[test]
    fn eight_tracks_in_four_orbits() {
        // Input deliberately not in recency order.
        let tracks: Vec<_> = [5, 1, 8, 3, 2, 7, 4, 6]
            .iter()
            .map(|&i| make_track(i, 1000 - i))
            .collect();

        let orbits = assign(&tracks, 4);
        assert_eq!(orbits.len(), 4);
        assert_eq!(ids(&orbits[0]), vec![1, 2]);
        assert_eq!(ids(&orbits[1]), vec![3, 4]);
        assert_eq!(ids(&orbits[2]), vec![5, 6]);
        assert_eq!(ids(&orbits[3]), vec![7, 8]);
    }

    #[test]
    fn uneven_split_leaves_trailing_orbits_short_or_empty() {
        let tracks: Vec<_> = (1..=5).map(|i| make_track(i, 100 - i)).collect();
        let orbits = assign(&tracks, 4);
        // ceil(5 / 4) = 2 per orbit
        assert_eq!(ids(&orbits[0]), vec![1, 2]);
        assert_eq!(ids(&orbits[1]), vec![3, 4]);
        assert_eq!(ids(&orbits[2]), vec![5]);
        assert!(orbits[3].is_empty());
    }

    #[test]
    fn empty_collection_gives_empty_orbits() {
        let orbits = assign(&[], 3);
        assert_eq!(orbits.len(), 3);
        assert!(orbits.iter().all(Vec::is_empty));
        assert!(assign(&[make_track(1, 1)], 0).is_empty());
    }

    #[test]
    fn ties_keep_input_order_and_are_deterministic() {
        let tracks = vec![
            make_track(10, 50),
            make_track(11, 50),
            make_track(12, 60),
            make_track(13, 50),
        ];
        let first = assign(&tracks, 2);
        assert_eq!(ids(&first[0]), vec![12, 10]);
        assert_eq!(ids(&first[1]), vec![11, 13]);
        assert_eq!(assign(&tracks, 2), first);
    }

    #[test]
    fn every_track_lands_in_exactly_one_orbit_newest_first() {
        let tracks: Vec<_> = (0..23).map(|i| make_track(i, (i * 7919) % 101)).collect();
        let orbits = assign(&tracks, 5);

        let mut seen: Vec<i64> = orbits.iter().flat_map(|o| ids(o)).collect();
        seen.sort();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());

        for i in 0..orbits.len() {
            for j in i + 1..orbits.len() {
                for a in &orbits[i] {
                    for b in &orbits[j] {
                        assert!(a.added_at >= b.added_at);
                    }
                }
            }
        }
    }

    #[test]
    fn single_orbit_lookup_matches_assignment() {
        let tracks: Vec<_> = (1..=6).map(|i| make_track(i, 100 - i)).collect();
        let all = assign(&tracks, 3);
        assert_eq!(orbit_tracks(&tracks, 3, 1), Some(all[1].clone()));
        assert_eq!(orbit_tracks(&tracks, 3, 3), None);
    }
}
