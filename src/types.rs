use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Identity of a song: the (title, artist) pair.
///
/// Compared field by field. The joined `title-artist` string only exists on
/// the wire, see [`SongKey::wire_name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SongKey {
    pub title: String,
    pub artist: String
}

impl SongKey {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self { title: title.into(), artist: artist.into() }
    }

    /// `song_name` as the home endpoint expects it
    pub fn wire_name(&self) -> String {
        format!("{}-{}", self.title, self.artist)
    }
}

impl fmt::Display for SongKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}", self.title, self.artist)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    pub artist: String,
    #[serde(deserialize_with = "year_text")]
    pub year: String,
    #[serde(default)]
    pub img_url: String
}

impl Song {
    pub fn key(&self) -> SongKey {
        SongKey::new(self.title.clone(), self.artist.clone())
    }

    pub fn has_key(&self, key: &SongKey) -> bool {
        self.title == key.title && self.artist == key.artist
    }
}

// The catalog stores years as numbers and sends them back as JSON numbers
// (sometimes floats), older rows carry strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Year {
    Int(i64),
    Float(f64),
    Text(String)
}

fn year_text<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Year::deserialize(d)? {
        Year::Int(y) => y.to_string(),
        Year::Float(y) if y.fract() == 0.0 => format!("{}", y as i64),
        Year::Float(y) => y.to_string(),
        Year::Text(y) => y
    })
}

/// Response of the home fetch
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HomeData {
    pub user_name: String,
    #[serde(default)]
    pub subscribed_songs: Vec<Song>
}

/// Search form contents; an empty string means the field is unset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub title: String,
    pub artist: String,
    pub year: String
}

impl SearchQuery {
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty()
            && self.artist.trim().is_empty()
            && self.year.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionAction {
    Subscribe,
    Unsubscribe
}

impl SubscriptionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionAction::Subscribe => "subscribe",
            SubscriptionAction::Unsubscribe => "unsubscribe"
        }
    }
}

/// Messages surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    EmptyQuery,
    NoResults,
    LoadFailed,
    MutationFailed { action: SubscriptionAction, key: SongKey }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::EmptyQuery => f.write_str("Please enter at least one search parameter"),
            Notice::NoResults => f.write_str("No results found. Please try again."),
            Notice::LoadFailed => f.write_str("Could not load your subscriptions."),
            Notice::MutationFailed { action, key } => {
                write!(f, "Could not {} {key}; the list was not changed.", action.as_str())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_accepts_numbers_and_text() {
        let songs: Vec<Song> = serde_json::from_value(serde_json::json!([
            {"title": "A", "artist": "B", "year": 1999, "img_url": "u"},
            {"title": "C", "artist": "D", "year": 2004.0, "img_url": "u"},
            {"title": "E", "artist": "F", "year": "1987"}
        ])).unwrap();

        assert_eq!(songs[0].year, "1999");
        assert_eq!(songs[1].year, "2004");
        assert_eq!(songs[2].year, "1987");
        assert_eq!(songs[2].img_url, "");
    }

    #[test]
    fn keys_compare_by_field_not_by_joined_text() {
        let a = SongKey::new("Hey-Ho", "Band");
        let b = SongKey::new("Hey", "Ho-Band");

        assert_eq!(a.wire_name(), b.wire_name());
        assert_ne!(a, b);
    }

    #[test]
    fn blank_query_ignores_whitespace() {
        let q = SearchQuery { title: "  ".into(), artist: String::new(), year: "\t".into() };
        assert!(q.is_blank());

        let q = SearchQuery { year: "1999".into(), ..Default::default() };
        assert!(!q.is_blank());
    }

    #[test]
    fn action_serializes_lowercase() {
        let v = serde_json::to_value(SubscriptionAction::Unsubscribe).unwrap();
        assert_eq!(v, serde_json::json!("unsubscribe"));
    }
}
