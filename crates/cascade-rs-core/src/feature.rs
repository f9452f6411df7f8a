//! Feature flags conditioning merge and load behaviour.

use std::collections::BTreeMap;

/// On/off toggles set at config construction and inherited by forks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    /// A loaded path that no declared item covers fails the load.
    FailOnUnknownPath,
    /// A missing file, resource or URL loads as an empty layer.
    OptionalSourceOnNotFound,
    /// Source keys match declared paths ignoring ASCII case.
    LoadKeysCaseInsensitively,
    /// `${path}` references in string values are substituted on load.
    SubstituteSourceBeforeLoaded,
}

impl Feature {
    /// Every feature, in declaration order.
    pub const ALL: [Feature; 4] = [
        Feature::FailOnUnknownPath,
        Feature::OptionalSourceOnNotFound,
        Feature::LoadKeysCaseInsensitively,
        Feature::SubstituteSourceBeforeLoaded,
    ];

    /// Only substitution is on unless enabled explicitly.
    pub fn enabled_by_default(self) -> bool {
        match self {
            Feature::FailOnUnknownPath => false,
            Feature::OptionalSourceOnNotFound => false,
            Feature::LoadKeysCaseInsensitively => false,
            Feature::SubstituteSourceBeforeLoaded => true,
        }
    }
}

/// Explicit overrides on top of [`Feature::enabled_by_default`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet {
    overrides: BTreeMap<Feature, bool>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(mut self, feature: Feature) -> Self {
        self.set(feature, true);
        self
    }

    pub fn disable(mut self, feature: Feature) -> Self {
        self.set(feature, false);
        self
    }

    /// Override the default for `feature`.
    pub fn set(&mut self, feature: Feature, enabled: bool) {
        self.overrides.insert(feature, enabled);
    }

    /// The override if one was set, else the default.
    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.overrides
            .get(&feature)
            .copied()
            .unwrap_or_else(|| feature.enabled_by_default())
    }

    /// Layer `other` on top of this set; its overrides win.
    pub fn merged_with(&self, other: &FeatureSet) -> FeatureSet {
        let mut overrides = self.overrides.clone();
        overrides.extend(other.overrides.iter().map(|(feature, on)| (*feature, *on)));
        FeatureSet { overrides }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_until_overridden() {
        let features = FeatureSet::new();
        assert!(!features.is_enabled(Feature::FailOnUnknownPath));
        assert!(features.is_enabled(Feature::SubstituteSourceBeforeLoaded));

        let features = features
            .enable(Feature::FailOnUnknownPath)
            .disable(Feature::SubstituteSourceBeforeLoaded);
        assert!(features.is_enabled(Feature::FailOnUnknownPath));
        assert!(!features.is_enabled(Feature::SubstituteSourceBeforeLoaded));
    }

    #[test]
    fn later_overrides_win_when_merged() {
        let parent = FeatureSet::new().enable(Feature::FailOnUnknownPath);
        let per_load = FeatureSet::new()
            .disable(Feature::FailOnUnknownPath)
            .enable(Feature::OptionalSourceOnNotFound);
        let merged = parent.merged_with(&per_load);
        assert!(!merged.is_enabled(Feature::FailOnUnknownPath));
        assert!(merged.is_enabled(Feature::OptionalSourceOnNotFound));
        assert!(parent.is_enabled(Feature::FailOnUnknownPath));
    }
}
