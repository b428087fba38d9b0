use crate::chat::CollectionStats;
use crate::collection_store::{CollectionStore, Emotion, NucleusMetadata, DEFAULT_NUCLEUS_NAME};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Keeps the nucleus metadata row in line with the collection.
///
/// The row is a cache: [`NucleusCurator::refresh`] rebuilds it from the tracks
/// alone, so it can be recomputed at any time.
pub struct NucleusCurator {
    store: Arc<dyn CollectionStore>,
    refresh_every: usize,
}

pub fn nucleus_name(dominant: Option<Emotion>) -> &'static str {
    match dominant {
        None => DEFAULT_NUCLEUS_NAME,
        Some(Emotion::Joy) => "Radiant Core",
        Some(Emotion::Sadness) => "Blue Hollow",
        Some(Emotion::Anger) => "Ember Storm",
        Some(Emotion::Fear) => "Shadow Pulse",
        Some(Emotion::Love) => "Heartglow",
        Some(Emotion::Surprise) => "Spark Nova",
        Some(Emotion::Calm) => "Still Waters",
        Some(Emotion::Nostalgia) => "Sepia Echo",
    }
}

fn describe(stats: &CollectionStats) -> Option<String> {
    let dominant = stats.dominant?;
    Some(format!(
        "A collection of {} tracks, {}% {}; mean valence {:.2}, mean energy {:.2}.",
        stats.total, stats.dominant_percentage, dominant, stats.mean_valence, stats.mean_energy
    ))
}

impl NucleusCurator {
    pub fn new(store: Arc<dyn CollectionStore>, refresh_every: usize) -> Self {
        Self {
            store,
            refresh_every: refresh_every.max(1),
        }
    }

    /// Called after each successful insert. Refreshes the row when the
    /// collection size reached a multiple of the refresh interval.
    pub fn on_track_added(&self) -> Result<Option<NucleusMetadata>> {
        let count = self.store.count_tracks()?;
        if count == 0 || count % self.refresh_every != 0 {
            return Ok(None);
        }
        self.refresh().map(Some)
    }

    pub fn refresh(&self) -> Result<NucleusMetadata> {
        let tracks = self.store.list_tracks()?;
        let stats = CollectionStats::compute(&tracks);
        let name = nucleus_name(stats.dominant);
        let metadata = self.store.update_nucleus_metadata(
            name,
            describe(&stats).as_deref(),
            stats.dominant,
        )?;
        info!(
            "Nucleus refreshed: '{}' over {} tracks (dominant {:?})",
            metadata.name, stats.total, stats.dominant
        );
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection_store::{NewTrack, SqliteCollectionStore};

    fn make_new_track(spotify_id: &str, emotion: Emotion) -> NewTrack {
        NewTrack {
            spotify_id: spotify_id.to_string(),
            source_url: format!("https://open.spotify.com/track/{}", spotify_id),
            title: spotify_id.to_string(),
            artist: None,
            lyrics: None,
            lyrics_url: None,
            emotion,
            valence: Some(0.5),
            energy: Some(0.5),
            tempo: None,
            genre: None,
            mood_description: None,
            dominant_instruments: None,
            vocal_characteristics: None,
            duration_ms: 1,
            thumbnail_url: None,
            preview_url: None,
        }
    }

    #[test]
    fn refreshes_only_on_multiples_of_interval() {
        let store = Arc::new(SqliteCollectionStore::in_memory().unwrap());
        let curator = NucleusCurator::new(store.clone(), 5);

        for i in 0..4 {
            store
                .insert_track(&make_new_track(&format!("t{}", i), Emotion::Calm))
                .unwrap();
            assert_eq!(curator.on_track_added().unwrap(), None);
        }
        assert_eq!(store.get_nucleus_metadata().unwrap().name, DEFAULT_NUCLEUS_NAME);

        store.insert_track(&make_new_track("t4", Emotion::Joy)).unwrap();
        let refreshed = curator.on_track_added().unwrap().unwrap();
        assert_eq!(refreshed.name, "Still Waters");
        assert_eq!(refreshed.dominant_emotion, Some(Emotion::Calm));
        assert!(refreshed.description.unwrap().contains("80% calm"));
        assert_eq!(store.get_nucleus_metadata().unwrap().name, "Still Waters");
    }

    #[test]
    fn refresh_on_empty_collection_resets_to_default() {
        let store = Arc::new(SqliteCollectionStore::in_memory().unwrap());
        store
            .update_nucleus_metadata("Stale", Some("old"), Some(Emotion::Fear))
            .unwrap();

        let metadata = NucleusCurator::new(store, 5).refresh().unwrap();
        assert_eq!(metadata.name, DEFAULT_NUCLEUS_NAME);
        assert_eq!(metadata.description, None);
        assert_eq!(metadata.dominant_emotion, None);
    }

    #[test]
    fn every_emotion_has_a_distinct_name() {
        let mut names: Vec<_> = Emotion::ALL.iter().map(|e| nucleus_name(Some(*e))).collect();
        names.push(nucleus_name(None));
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 9);
    }
}
