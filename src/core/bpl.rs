// Batch play list model: recordings with optional time sections

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Time window inside a recording.
///
/// A relative bound is an offset from the first timestamp of the recording,
/// an absolute bound is a timestamp. Both are in the recording's time unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub start_ts: u64,
    pub end_ts: u64,
    #[serde(default)]
    pub start_relative: bool,
    #[serde(default)]
    pub end_relative: bool,
}

impl Section {
    pub fn new(start_ts: u64, end_ts: u64, relative: bool) -> Self {
        Self {
            start_ts,
            end_ts,
            start_relative: relative,
            end_relative: relative,
        }
    }

    pub fn is_relative(&self) -> bool {
        self.start_relative || self.end_relative
    }

    /// Absolute `(start, end)` bounds for a recording starting at `first_ts`.
    pub fn resolve(&self, first_ts: f64) -> (f64, f64) {
        let bound = |ts: u64, relative: bool| {
            if relative {
                first_ts + ts as f64
            } else {
                ts as f64
            }
        };
        (
            bound(self.start_ts, self.start_relative),
            bound(self.end_ts, self.end_relative),
        )
    }

    /// `(start_ts, end_ts, relative)`
    pub fn as_tuple(&self) -> (u64, u64, bool) {
        (self.start_ts, self.end_ts, self.is_relative())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BplEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl BplEntry {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: PathBuf::from(path.as_ref().to_string_lossy().trim()),
            sections: Vec::new(),
        }
    }

    pub fn push(&mut self, start_ts: u64, end_ts: u64, relative: bool) {
        self.sections.push(Section::new(start_ts, end_ts, relative));
    }

    pub fn has_sections(&self) -> bool {
        !self.sections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Section> {
        self.sections.iter()
    }
}

impl<'a> IntoIterator for &'a BplEntry {
    type Item = &'a Section;
    type IntoIter = std::slice::Iter<'a, Section>;

    fn into_iter(self) -> Self::IntoIter {
        self.sections.iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPlayList {
    pub entries: Vec<BplEntry>,
}

impl BatchPlayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: BplEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BplEntry> {
        self.entries.iter()
    }

    pub fn find<P: AsRef<Path>>(&self, path: P) -> Option<&BplEntry> {
        self.entries.iter().find(|e| e.path == path.as_ref())
    }

    /// Recording path to `(start, end)` pairs. Relative flags are dropped,
    /// callers have to know which kind of bounds the list carries.
    pub fn to_map(&self) -> BTreeMap<PathBuf, Vec<(u64, u64)>> {
        self.entries
            .iter()
            .map(|e| {
                (
                    e.path.clone(),
                    e.sections.iter().map(|s| (s.start_ts, s.end_ts)).collect(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_resolve() {
        let abs = Section::new(1_000, 2_000, false);
        assert_eq!(abs.resolve(500.0), (1_000.0, 2_000.0));

        let rel = Section::new(10, 20, true);
        assert_eq!(rel.resolve(500.0), (510.0, 520.0));

        let mixed = Section {
            start_ts: 10,
            end_ts: 900,
            start_relative: true,
            end_relative: false,
        };
        assert!(mixed.is_relative());
        assert_eq!(mixed.resolve(500.0), (510.0, 900.0));
    }

    #[test]
    fn test_entry_and_map() {
        let mut bpl = BatchPlayList::new();
        let mut rec = BplEntry::new("  /data/rec_001.rrec ");
        rec.push(100, 200, false);
        rec.push(300, 400, true);
        bpl.push(rec);
        bpl.push(BplEntry::new("/data/rec_002.rrec"));

        assert_eq!(bpl.len(), 2);
        let first = bpl.find("/data/rec_001.rrec").unwrap();
        assert!(first.has_sections());
        assert_eq!(first.iter().count(), 2);
        assert_eq!(first.sections[1].as_tuple(), (300, 400, true));
        assert!(!bpl.find("/data/rec_002.rrec").unwrap().has_sections());

        let map = bpl.to_map();
        assert_eq!(
            map[&PathBuf::from("/data/rec_001.rrec")],
            vec![(100, 200), (300, 400)]
        );
        assert!(map[&PathBuf::from("/data/rec_002.rrec")].is_empty());
    }

    #[test]
    fn test_section_deserialize_defaults() {
        let s: Section = serde_json::from_str(r#"{"start_ts": 5, "end_ts": 9}"#).unwrap();
        assert_eq!(s, Section::new(5, 9, false));
    }
}
