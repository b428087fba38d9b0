//! Aggregate statistics over the collection and the context text built from them.

use crate::collection_store::{Emotion, Track};
use std::fmt::Write;

/// Statistics over every track of a collection (or of one emotion channel).
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionStats {
    pub total: usize,
    /// Count per present emotion, in order of first appearance.
    pub histogram: Vec<(Emotion, usize)>,
    /// Mean over tracks with a valence; 0 when none has one.
    pub mean_valence: f64,
    pub mean_energy: f64,
    /// Most frequent emotion; ties go to the one encountered first.
    pub dominant: Option<Emotion>,
    /// Share of the dominant emotion, rounded to the nearest percent.
    pub dominant_percentage: u32,
    /// Labels of the fixed set with no track at all, in canonical order.
    pub absent: Vec<Emotion>,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn percentage(count: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        (count as f64 * 100.0 / total as f64).round() as u32
    }
}

impl CollectionStats {
    pub fn compute(tracks: &[Track]) -> Self {
        let mut histogram: Vec<(Emotion, usize)> = Vec::new();
        for track in tracks {
            match histogram.iter_mut().find(|(e, _)| *e == track.emotion) {
                Some((_, count)) => *count += 1,
                None => histogram.push((track.emotion, 1)),
            }
        }

        let mut dominant: Option<(Emotion, usize)> = None;
        for &(emotion, count) in &histogram {
            if dominant.map_or(true, |(_, best)| count > best) {
                dominant = Some((emotion, count));
            }
        }

        let absent = Emotion::ALL
            .iter()
            .copied()
            .filter(|e| !histogram.iter().any(|(present, _)| present == e))
            .collect();

        Self {
            total: tracks.len(),
            mean_valence: mean(tracks.iter().filter_map(|t| t.valence)),
            mean_energy: mean(tracks.iter().filter_map(|t| t.energy)),
            dominant: dominant.map(|(e, _)| e),
            dominant_percentage: dominant.map_or(0, |(_, count)| percentage(count, tracks.len())),
            histogram,
            absent,
        }
    }

    pub fn count(&self, emotion: Emotion) -> usize {
        self.histogram
            .iter()
            .find(|(e, _)| *e == emotion)
            .map_or(0, |(_, count)| *count)
    }

    pub fn present(&self) -> Vec<Emotion> {
        self.histogram.iter().map(|(e, _)| *e).collect()
    }
}

fn format_unit(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

/// One line per sample track: `"title" by artist — emotion, valence:X.XX, energy:X.XX, mood`.
pub fn format_sample_track(track: &Track) -> String {
    let mut line = format!(
        "\"{}\" by {} — {}, valence:{}, energy:{}",
        track.title,
        track.artist.as_deref().unwrap_or("unknown artist"),
        track.emotion,
        format_unit(track.valence),
        format_unit(track.energy),
    );
    if let Some(mood) = track.mood_description.as_deref().filter(|m| !m.is_empty()) {
        line.push_str(", ");
        line.push_str(mood);
    }
    line
}

/// Summary of `tracks` to place ahead of the conversation.
///
/// `tracks` must be in persisted order (most recent first); only the first
/// `sample_size` are listed individually, the statistics cover all of them.
pub fn build_collection_context(stats: &CollectionStats, tracks: &[Track], sample_size: usize) -> String {
    let mut out = String::new();

    if stats.total == 0 {
        out.push_str("The collection is empty: no tracks have been added yet.\n");
        return out;
    }

    let _ = writeln!(out, "Collection size: {} tracks.", stats.total);

    let distribution = stats
        .histogram
        .iter()
        .map(|(e, count)| format!("{}: {} ({}%)", e, count, percentage(*count, stats.total)))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "Emotion distribution: {}", distribution);

    if let Some(dominant) = stats.dominant {
        let _ = writeln!(
            out,
            "Dominant emotion: {} ({}% of tracks)",
            dominant, stats.dominant_percentage
        );
    }

    let absent = if stats.absent.is_empty() {
        "none".to_string()
    } else {
        stats
            .absent
            .iter()
            .map(|e| e.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let _ = writeln!(out, "Emotions not present in the collection: {}", absent);

    let _ = writeln!(
        out,
        "Average valence: {:.2}, average energy: {:.2}",
        stats.mean_valence, stats.mean_energy
    );

    let _ = writeln!(out, "Sample tracks (most recent first):");
    for track in tracks.iter().take(sample_size) {
        let _ = writeln!(out, "- {}", format_sample_track(track));
    }

    out
}
