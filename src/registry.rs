use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Profile as persisted by the backend: a named binding of a game and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub game: String,
    pub name: String,
    pub version: String,
}

impl Profile {
    pub fn new(game: &str, name: &str, version: &str) -> Self {
        Self {
            game: game.to_string(),
            name: name.to_string(),
            version: version.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDef {
    pub id: String,
    pub name: String,
}

impl GameDef {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

pub fn default_catalog() -> Vec<GameDef> {
    vec![
        GameDef::new("ultracraft", "Ultracraft"),
        GameDef::new("infinicraft", "Infinicraft"),
        GameDef::new("bubble-blaster", "Bubble Blaster Java"),
        GameDef::new("bubbles-pygdx", "Bubble Blaster PyGDX"),
        GameDef::new("bubbles-graalgdx", "Bubble Blaster GraalGDX"),
        GameDef::new("qplay-bubbles", "Bubble Blaster Legacy"),
        GameDef::new("bb-og", "Bubble Blaster OG"),
        GameDef::new("hangman-v5", "Hangman v5"),
    ]
}

/// A selectable row in the side panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Profile(Profile),
    Game(GameDef),
}

impl Entry {
    /// Stable lookup key: the game id for games, the name for profiles.
    pub fn key(&self) -> &str {
        match self {
            Entry::Profile(profile) => &profile.name,
            Entry::Game(game) => &game.id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Entry::Profile(profile) => &profile.name,
            Entry::Game(game) => &game.name,
        }
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            Entry::Profile(profile) => Some(&profile.version),
            Entry::Game(_) => None,
        }
    }

    pub fn game_ref(&self) -> Option<&str> {
        match self {
            Entry::Profile(profile) => Some(&profile.game),
            Entry::Game(_) => None,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Entry::Profile(_) => "Profile",
            Entry::Game(_) => "Game",
        }
    }
}

/// Ordered backing store for the side panel.
///
/// Duplicates by display name may coexist here; [`Registry::visible`] hides
/// every occurrence after the first.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn replace(&mut self, entries: Vec<Entry>) {
        self.entries = entries;
    }

    pub fn append(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn find(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.key() == key)
    }

    pub fn visible(&self) -> Vec<&Entry> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|entry| seen.insert(entry.display_name()))
            .collect()
    }
}

impl From<Vec<Profile>> for Registry {
    fn from(profiles: Vec<Profile>) -> Self {
        Self {
            entries: profiles.into_iter().map(Entry::Profile).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Entry {
        Entry::Profile(Profile::new("ultracraft", name, "1.0"))
    }

    fn visible_names(registry: &Registry) -> Vec<String> {
        registry
            .visible()
            .iter()
            .map(|entry| entry.display_name().to_string())
            .collect()
    }

    #[test]
    fn visible_keeps_first_occurrence_per_name() {
        let registry = Registry::from(vec![
            Profile::new("ultracraft", "A", "1.0"),
            Profile::new("ultracraft", "B", "1.0"),
            Profile::new("infinicraft", "A", "2.0"),
        ]);

        assert_eq!(visible_names(&registry), vec!["A", "B"]);
        let first = registry.visible()[0];
        assert_eq!(first.game_ref(), Some("ultracraft"));
        assert_eq!(first.version(), Some("1.0"));
    }

    #[test]
    fn append_keeps_duplicates_in_backing_store() {
        let mut registry = Registry::new();
        registry.append(named("A"));
        registry.append(named("A"));

        assert_eq!(registry.len(), 2);
        assert_eq!(visible_names(&registry), vec!["A"]);
    }

    #[test]
    fn replace_swaps_contents_wholesale() {
        let mut registry = Registry::from(vec![Profile::new("g", "Old", "1")]);
        registry.replace(vec![named("New"), named("Other")]);

        assert_eq!(visible_names(&registry), vec!["New", "Other"]);
        assert!(registry.find("Old").is_none());
    }

    #[test]
    fn games_are_keyed_by_id_and_listed_by_name() {
        let mut registry = Registry::new();
        registry.replace(default_catalog().into_iter().map(Entry::Game).collect());

        let entry = registry.find("bb-og").expect("catalog entry");
        assert_eq!(entry.display_name(), "Bubble Blaster OG");
        assert_eq!(entry.version(), None);
        assert!(registry.find("Bubble Blaster OG").is_none());
    }

    #[test]
    fn find_returns_first_match_for_duplicate_keys() {
        let mut registry = Registry::new();
        registry.append(Entry::Profile(Profile::new("g1", "A", "1")));
        registry.append(Entry::Profile(Profile::new("g2", "A", "2")));

        assert_eq!(registry.find("A").and_then(Entry::game_ref), Some("g1"));
    }
}
