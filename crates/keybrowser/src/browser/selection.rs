//! Click, ctrl-click and shift-click selection over the flattened rows

use super::types::ItemKind;

/// Modifier state of a selection click
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    /// Keep the key selected even if it already is (no deselect-by-reclick)
    pub force: bool,
}

impl Modifiers {
    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::default()
        }
    }

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::default()
        }
    }

    pub fn force() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }
}

/// Selected keys plus the anchor that shift-click ranges are measured from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    keys: Vec<String>,
    anchor: Option<String>,
}

impl Selection {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Replace keys and anchor wholesale
    pub fn set(&mut self, keys: Vec<String>, anchor: Option<String>) {
        self.keys = dedup(keys);
        self.anchor = anchor;
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.anchor = None;
    }

    /// Apply one click to the selection.
    ///
    /// `visible` is the flattened row sequence the click happened in; it is
    /// only consulted for shift-click ranges.
    pub fn select(
        &mut self,
        key: &str,
        _kind: ItemKind,
        modifiers: Modifiers,
        multiple: bool,
        visible: &[String],
    ) {
        let toggle = modifiers.ctrl || (modifiers.shift && self.anchor.is_none());
        let range = !toggle && modifiers.shift;

        if toggle && multiple {
            self.toggle(key);
            return;
        }

        if range && multiple {
            if let Some(span) = self.range_span(key, visible) {
                for k in span {
                    if !self.contains(k) {
                        self.keys.push(k.clone());
                    }
                }
                self.anchor = Some(key.to_string());
                return;
            }
        }

        if !modifiers.force && self.contains(key) {
            self.clear();
        } else {
            self.keys = vec![key.to_string()];
            self.anchor = Some(key.to_string());
        }
    }

    fn toggle(&mut self, key: &str) {
        if let Some(idx) = self.keys.iter().position(|k| k == key) {
            self.keys.remove(idx);
        } else {
            self.keys.push(key.to_string());
        }
        self.anchor = None;
    }

    /// Inclusive slice of `visible` between the anchor and `key`
    fn range_span<'v>(&self, key: &str, visible: &'v [String]) -> Option<&'v [String]> {
        let anchor = self.anchor.as_deref()?;
        let mut begin = visible.iter().position(|k| k == anchor)?;
        let mut end = visible.iter().position(|k| k == key)?;
        if begin > end {
            std::mem::swap(&mut begin, &mut end);
        }
        Some(&visible[begin..=end])
    }
}

fn dedup(keys: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(keys.len());
    for key in keys {
        if !out.contains(&key) {
            out.push(key);
        }
    }
    out
}
