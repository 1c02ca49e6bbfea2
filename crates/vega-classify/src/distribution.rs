// vega-classify/src/distribution.rs
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Round a percentage to two decimals.
pub fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Class name → probability in percent (`[0, 100]`, two decimals).
///
/// Entries keep the classifier's class order. Values are never mutated in
/// place; every correction builds a new distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDistribution {
    entries: Vec<(String, f32)>,
}

impl ClassDistribution {
    /// From classifier probabilities in `[0, 1]`, one per class name.
    pub fn from_probabilities(class_names: &[String], probabilities: &[f32]) -> Self {
        let entries = class_names
            .iter()
            .zip(probabilities)
            .map(|(name, &p)| (name.clone(), round2(p * 100.0)))
            .collect();
        Self { entries }
    }

    /// Every class at 0 and `label` at 100; `label` is appended when it is
    /// not one of `class_names`.
    pub fn certain(class_names: &[String], label: &str) -> Self {
        let mut entries: Vec<(String, f32)> = class_names
            .iter()
            .map(|name| (name.clone(), if name == label { 100.0 } else { 0.0 }))
            .collect();
        if !class_names.iter().any(|name| name == label) {
            entries.push((label.to_string(), 100.0));
        }
        Self { entries }
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        self.entries.iter().find(|(name, _)| name == label).map(|&(_, p)| p)
    }

    /// Highest-probability class; ties go to the earliest class.
    pub fn top(&self) -> Option<(&str, f32)> {
        let mut best: Option<(&str, f32)> = None;
        for (name, p) in &self.entries {
            match best {
                Some((_, bp)) if *p <= bp => {}
                _ => best = Some((name.as_str(), *p)),
            }
        }
        best
    }

    /// Move all of `from`'s mass onto `to`, leaving the total unchanged.
    /// `to` is appended when absent; a missing `from` yields an unchanged copy.
    pub fn transfer(&self, from: &str, to: &str) -> Self {
        let Some(moved) = self.get(from) else {
            return self.clone();
        };
        let mut entries: Vec<(String, f32)> = self
            .entries
            .iter()
            .map(|(name, p)| {
                let p = if name == from {
                    0.0
                } else if name == to {
                    round2(p + moved)
                } else {
                    *p
                };
                (name.clone(), p)
            })
            .collect();
        if self.get(to).is_none() {
            entries.push((to.to_string(), moved));
        }
        Self { entries }
    }

    pub fn total(&self) -> f32 {
        self.entries.iter().map(|(_, p)| p).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.entries.iter().map(|(name, p)| (name.as_str(), *p))
    }
}

impl Serialize for ClassDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, p) in &self.entries {
            map.serialize_entry(name, p)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        ["Urban Area", "Agricultural Land", "Forest", "Water Body", "Barren Land"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn percentages_are_rounded() {
        let d = ClassDistribution::from_probabilities(&names(), &[0.123456, 0.2, 0.3, 0.376544, 0.0]);
        assert_eq!(d.get("Urban Area"), Some(12.35));
        assert_eq!(d.get("Water Body"), Some(37.65));
        assert!((d.total() - 100.0).abs() < 0.05);
    }

    #[test]
    fn top_prefers_earliest_on_ties() {
        let d = ClassDistribution::from_probabilities(&names(), &[0.1, 0.4, 0.4, 0.1, 0.0]);
        assert_eq!(d.top(), Some(("Agricultural Land", 40.0)));
    }

    #[test]
    fn certain_appends_foreign_label() {
        let d = ClassDistribution::certain(&names(), "Shadow");
        assert_eq!(d.len(), 6);
        assert_eq!(d.top(), Some(("Shadow", 100.0)));
        assert_eq!(d.total(), 100.0);

        let water = ClassDistribution::certain(&names(), "Water Body");
        assert_eq!(water.len(), 5);
        assert_eq!(water.iter().filter(|(_, p)| *p == 100.0).count(), 1);
    }

    #[test]
    fn transfer_moves_mass_and_keeps_total() {
        let d = ClassDistribution::from_probabilities(&names(), &[0.05, 0.1, 0.05, 0.6, 0.2]);
        let moved = d.transfer("Water Body", "Barren Land");
        assert_eq!(moved.get("Water Body"), Some(0.0));
        assert_eq!(moved.get("Barren Land"), Some(80.0));
        assert!((moved.total() - d.total()).abs() < 1e-3);
        // the source value is untouched
        assert_eq!(d.get("Water Body"), Some(60.0));
    }

    #[test]
    fn serializes_as_ordered_map() {
        let d = ClassDistribution::certain(&names()[..2], "Urban Area");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"{"Urban Area":100.0,"Agricultural Land":0.0}"#);
    }
}
