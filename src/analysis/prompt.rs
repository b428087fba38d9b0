use crate::collection_store::Emotion;
use crate::llm::Message;

/// What the model gets to listen to or read when profiling a track.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisSource {
    /// Full lyrics text. The default variant.
    LyricsText {
        title: String,
        artist: Option<String>,
        lyrics: String,
    },
    /// A short audio clip, sent inline.
    AudioBytes {
        title: String,
        artist: Option<String>,
        mime_type: String,
        data: Vec<u8>,
    },
    /// Only a link to the track; the model relies on what it knows about it.
    EmbedReference {
        title: String,
        artist: Option<String>,
        url: String,
    },
}

impl AnalysisSource {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisSource::LyricsText { .. } => "lyrics",
            AnalysisSource::AudioBytes { .. } => "audio",
            AnalysisSource::EmbedReference { .. } => "embed",
        }
    }

    fn title_line(title: &str, artist: Option<&str>) -> String {
        match artist {
            Some(artist) => format!("\"{}\" by {}", title, artist),
            None => format!("\"{}\" (unknown artist)", title),
        }
    }
}

fn system_prompt() -> String {
    let labels = Emotion::ALL
        .iter()
        .map(|e| e.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are a music analyst. Profile the emotional and musical character of a song.\n\
         Answer with a single JSON object and nothing else, using exactly these keys:\n\
         - \"emotion\": one of [{labels}]\n\
         - \"valence\": number between 0 and 1 (0 = negative, 1 = positive)\n\
         - \"energy\": number between 0 and 1 (0 = calm, 1 = intense)\n\
         - \"tempo\": estimated BPM as an integer, or null if unknown\n\
         - \"genre\": short genre description\n\
         - \"mood_description\": one sentence describing the mood\n\
         - \"dominant_instruments\": comma separated instruments, or null\n\
         - \"vocal_characteristics\": short description of the vocals"
    )
}

/// The conversation sent to the model for one analysis.
pub fn build_analysis_messages(source: &AnalysisSource) -> Vec<Message> {
    let user = match source {
        AnalysisSource::LyricsText {
            title,
            artist,
            lyrics,
        } => Message::user(format!(
            "Song: {}\n\nLyrics:\n{}",
            AnalysisSource::title_line(title, artist.as_deref()),
            lyrics
        )),
        AnalysisSource::AudioBytes {
            title,
            artist,
            mime_type,
            data,
        } => Message::user(format!(
            "Song: {}\n\nThe attached audio is a preview clip of the song. Base the profile on what you hear.",
            AnalysisSource::title_line(title, artist.as_deref())
        ))
        .with_inline_data(mime_type.clone(), data.clone()),
        AnalysisSource::EmbedReference { title, artist, url } => Message::user(format!(
            "Song: {}\nReference: {}\n\nBase the profile on what you know about this recording.",
            AnalysisSource::title_line(title, artist.as_deref()),
            url
        )),
    };

    vec![Message::system(system_prompt()), user]
}
