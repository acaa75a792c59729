//! Named resolution presets.
//!
//! Presets let callers ask for `"720p"` instead of spelling out
//! `width`/`height`. The table is static and read-only.

/* --------------------------------------------------------------------------
Named constants
-------------------------------------------------------------------------- */

/// Simplified-parameter key that selects a preset.
pub const RESOLUTION_PARAM: &str = "resolution";

/// Simplified-parameter key for the output width.
pub const WIDTH_PARAM: &str = "width";

/// Simplified-parameter key for the output height.
pub const HEIGHT_PARAM: &str = "height";

/// A named `(width, height)` shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionPreset {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

const fn preset(name: &'static str, width: u32, height: u32) -> ResolutionPreset {
    ResolutionPreset {
        name,
        width,
        height,
    }
}

/// All presets, landscape first, then portrait, then square.
pub const RESOLUTION_PRESETS: &[ResolutionPreset] = &[
    preset("480p", 854, 480),
    preset("720p", 1280, 720),
    // Native size for the LTX-2 family of templates.
    preset("768p", 1360, 768),
    preset("1080p", 1920, 1080),
    preset("480p_portrait", 480, 854),
    preset("720p_portrait", 720, 1280),
    preset("1080p_portrait", 1080, 1920),
    preset("512", 512, 512),
    preset("768", 768, 768),
    preset("1024", 1024, 1024),
];

/* --------------------------------------------------------------------------
Lookup
-------------------------------------------------------------------------- */

/// Resolve a preset name to `(width, height)`.
pub fn resolve_preset(name: &str) -> Option<(u32, u32)> {
    RESOLUTION_PRESETS
        .iter()
        .find(|p| p.name == name)
        .map(|p| (p.width, p.height))
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
