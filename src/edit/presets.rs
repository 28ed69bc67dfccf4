use serde::Serialize;

use crate::edit::orchestrator::ValidationError;

pub const QUICK_EDITS: [&str; 8] = [
    "Remove background",
    "Enhance colors",
    "Add vintage filter",
    "Make professional",
    "Increase sharpness",
    "Fix lighting",
    "Portrait mode",
    "Add blur effect",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub name: &'static str,
    pub instruction: &'static str,
}

pub const PRESETS: [Preset; 5] = [
    Preset {
        name: "vintage",
        instruction: "Add warm vintage tones with slight grain and faded effect",
    },
    Preset {
        name: "bw",
        instruction: "Convert to professional black and white with high contrast",
    },
    Preset {
        name: "vibrant",
        instruction: "Boost saturation and vibrancy significantly, make colors pop",
    },
    Preset {
        name: "soft",
        instruction: "Add soft, dreamy effect with light leaks and gentle glow",
    },
    Preset {
        name: "cinematic",
        instruction: "Apply cinematic color grading with teal and orange tones",
    },
];

pub fn preset_instruction(name: &str) -> Result<&'static str, ValidationError> {
    let wanted = name.trim();
    PRESETS
        .iter()
        .find(|preset| preset.name.eq_ignore_ascii_case(wanted))
        .map(|preset| preset.instruction)
        .ok_or_else(|| ValidationError::UnknownPreset(wanted.to_string()))
}

#[derive(Debug, Clone, Serialize)]
pub struct PresetCatalog {
    pub quick_edits: Vec<&'static str>,
    pub presets: Vec<Preset>,
}

pub fn preset_catalog() -> PresetCatalog {
    PresetCatalog {
        quick_edits: QUICK_EDITS.to_vec(),
        presets: PRESETS.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_lookup_is_case_insensitive() {
        assert_eq!(
            preset_instruction(" Cinematic ").expect("preset should resolve"),
            "Apply cinematic color grading with teal and orange tones"
        );
    }

    #[test]
    fn unknown_preset_is_a_validation_error() {
        let err = preset_instruction("sepia").expect_err("unknown preset should fail");
        assert!(matches!(err, ValidationError::UnknownPreset(ref name) if name == "sepia"));
    }

    #[test]
    fn catalog_lists_every_quick_edit_and_preset() {
        let catalog = preset_catalog();
        assert_eq!(catalog.quick_edits.len(), QUICK_EDITS.len());
        assert_eq!(catalog.presets.len(), PRESETS.len());
        assert_eq!(catalog.quick_edits[0], "Remove background");
    }
}
