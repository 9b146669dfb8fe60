//! # Tuning Preset Module
//!
//! Static table of guitar tunings. Each preset lists its strings from the
//! lowest (string 6) to the highest (string 1) together with the target
//! frequency of every open string in equal temperament, A4 = 440 Hz.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt;

/// One open string of a tuning: its note name and target pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StringSpec {
    /// Note name as shown to the player (e.g. "E2", "Eb4").
    pub note_name: &'static str,
    /// Frequency of the open string in Hz.
    pub target_frequency_hz: f64,
}

/// A named tuning. Strings are ordered low to high pitch.
#[derive(Debug, PartialEq)]
pub struct TuningPreset {
    /// Short identifier used in settings files (e.g. "dropD").
    pub id: &'static str,
    /// Display name (e.g. "Drop D (DADGBE)").
    pub name: &'static str,
    pub strings: &'static [StringSpec],
}

const fn s(note_name: &'static str, target_frequency_hz: f64) -> StringSpec {
    StringSpec {
        note_name,
        target_frequency_hz,
    }
}

pub static STANDARD: TuningPreset = TuningPreset {
    id: "standard",
    name: "Standard (EADGBE)",
    strings: &[
        s("E2", 82.41),
        s("A2", 110.00),
        s("D3", 146.83),
        s("G3", 196.00),
        s("B3", 246.94),
        s("E4", 329.63),
    ],
};

pub static DROP_D: TuningPreset = TuningPreset {
    id: "dropD",
    name: "Drop D (DADGBE)",
    strings: &[
        s("D2", 73.42),
        s("A2", 110.00),
        s("D3", 146.83),
        s("G3", 196.00),
        s("B3", 246.94),
        s("E4", 329.63),
    ],
};

pub static HALF_STEP_DOWN: TuningPreset = TuningPreset {
    id: "halfStep",
    name: "Half Step Down",
    strings: &[
        s("Eb2", 77.78),
        s("Ab2", 103.83),
        s("Db3", 138.59),
        s("Gb3", 185.00),
        s("Bb3", 233.08),
        s("Eb4", 311.13),
    ],
};

pub static FULL_STEP_DOWN: TuningPreset = TuningPreset {
    id: "fullStep",
    name: "Full Step Down",
    strings: &[
        s("D2", 73.42),
        s("G2", 98.00),
        s("C3", 130.81),
        s("F3", 174.61),
        s("A3", 220.00),
        s("D4", 293.66),
    ],
};

pub static OPEN_G: TuningPreset = TuningPreset {
    id: "openG",
    name: "Open G (DGDGBD)",
    strings: &[
        s("D2", 73.42),
        s("G2", 98.00),
        s("D3", 146.83),
        s("G3", 196.00),
        s("B3", 246.94),
        s("D4", 293.66),
    ],
};

pub static DADGAD: TuningPreset = TuningPreset {
    id: "dadgad",
    name: "DADGAD",
    strings: &[
        s("D2", 73.42),
        s("A2", 110.00),
        s("D3", 146.83),
        s("G3", 196.00),
        s("A3", 220.00),
        s("D4", 293.66),
    ],
};

/// Every preset, in the order they are offered to the player.
pub static PRESETS: [&TuningPreset; 6] = [
    &STANDARD,
    &DROP_D,
    &HALF_STEP_DOWN,
    &FULL_STEP_DOWN,
    &OPEN_G,
    &DADGAD,
];

/// Lower-cased id and display name -> preset.
static PRESET_MAP: Lazy<BTreeMap<String, &'static TuningPreset>> = Lazy::new(|| {
    PRESETS
        .iter()
        .flat_map(|p| [(p.id.to_lowercase(), *p), (p.name.to_lowercase(), *p)])
        .collect()
});

/// Looks a preset up by id or display name, ignoring case.
pub fn preset_by_name(name: &str) -> Option<&'static TuningPreset> {
    PRESET_MAP.get(&name.trim().to_lowercase()).copied()
}

impl TuningPreset {
    /// Index of the string whose target is closest to `frequency_hz`.
    ///
    /// Linear scan with a strict `<`, so an exact tie keeps the lower index.
    pub fn closest_string(&self, frequency_hz: f64) -> usize {
        let mut closest_index = 0;
        let mut smallest_diff = f64::INFINITY;
        for (i, string) in self.strings.iter().enumerate() {
            let diff = (frequency_hz - string.target_frequency_hz).abs();
            if diff < smallest_diff {
                smallest_diff = diff;
                closest_index = i;
            }
        }
        closest_index
    }

    /// The string at `index`, low string first.
    pub fn string(&self, index: usize) -> Option<&'static StringSpec> {
        self.strings.get(index)
    }

    /// Guitar string number for an index: the lowest string is number 6
    /// on a six-string guitar, the highest is number 1.
    pub fn string_number(&self, index: usize) -> usize {
        self.strings.len().saturating_sub(index)
    }
}

impl fmt::Display for TuningPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Free-function form of [`TuningPreset::closest_string`].
pub fn closest_string(frequency_hz: f64, preset: &TuningPreset) -> usize {
    preset.closest_string(frequency_hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_is_strictly_ascending() {
        for preset in PRESETS {
            assert_eq!(preset.strings.len(), 6, "{}", preset.name);
            for pair in preset.strings.windows(2) {
                assert!(
                    pair[0].target_frequency_hz < pair[1].target_frequency_hz,
                    "{}: {} !< {}",
                    preset.name,
                    pair[0].note_name,
                    pair[1].note_name
                );
            }
        }
    }

    #[test]
    fn closest_string_prefers_nearest_target() {
        assert_eq!(closest_string(110.5, &STANDARD), 1);
        assert_eq!(closest_string(80.0, &STANDARD), 0);
        assert_eq!(closest_string(1000.0, &STANDARD), 5);
        assert_eq!(closest_string(20.0, &DROP_D), 0);
        assert_eq!(closest_string(221.0, &DADGAD), 4);
    }

    #[test]
    fn exact_tie_keeps_the_lower_string() {
        static EVEN: TuningPreset = TuningPreset {
            id: "even",
            name: "Even",
            strings: &[s("G2", 100.0), s("G3", 200.0), s("D4", 300.0)],
        };
        assert_eq!(EVEN.closest_string(150.0), 0);
        assert_eq!(EVEN.closest_string(250.0), 1);
    }

    #[test]
    fn lookup_accepts_id_or_display_name() {
        assert_eq!(preset_by_name("standard"), Some(&STANDARD));
        assert_eq!(preset_by_name("DROPD"), Some(&DROP_D));
        assert_eq!(preset_by_name("Open G (DGDGBD)"), Some(&OPEN_G));
        assert_eq!(preset_by_name(" dadgad "), Some(&DADGAD));
        assert_eq!(preset_by_name("nashville"), None);
    }

    #[test]
    fn string_numbers_count_down_from_the_low_string() {
        assert_eq!(STANDARD.string_number(0), 6);
        assert_eq!(STANDARD.string_number(5), 1);
        assert_eq!(STANDARD.string(1).map(|s| s.note_name), Some("A2"));
        assert!(STANDARD.string(6).is_none());
    }
}
