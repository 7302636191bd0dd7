//! Static hairstyle catalog driven through the generation queue

/// One fixed (style name, generation instruction) pair, known at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleCatalogEntry {
    /// Stable identifier, used in look ids and API paths
    pub key: &'static str,
    /// Name shown to the user
    pub display_name: &'static str,
    /// Style description handed to the generation backend
    pub instruction: &'static str,
}

/// The built-in catalog, in presentation order. One generation request is
/// created per entry when a capture session starts.
pub const HAIRSTYLES: &[StyleCatalogEntry] = &[
    StyleCatalogEntry {
        key: "classic-bob",
        display_name: "Classic Bob",
        instruction: "A sleek chin-length classic bob with clean blunt ends and a subtle inward curve",
    },
    StyleCatalogEntry {
        key: "long-layers",
        display_name: "Long Layers",
        instruction: "Long flowing hair with soft face-framing layers and natural movement",
    },
    StyleCatalogEntry {
        key: "pixie-cut",
        display_name: "Pixie Cut",
        instruction: "A short textured pixie cut with tapered sides and a slightly tousled top",
    },
    StyleCatalogEntry {
        key: "beach-waves",
        display_name: "Beach Waves",
        instruction: "Shoulder-length relaxed beach waves with a sun-kissed tousled finish",
    },
    StyleCatalogEntry {
        key: "sleek-straight",
        display_name: "Sleek Straight",
        instruction: "Glass-smooth straight hair with a precise middle part and mirror shine",
    },
    StyleCatalogEntry {
        key: "curly-volume",
        display_name: "Curly Volume",
        instruction: "Defined voluminous curls with rich bounce and healthy natural definition",
    },
    StyleCatalogEntry {
        key: "modern-shag",
        display_name: "Modern Shag",
        instruction: "A modern shag with choppy layers, curtain bangs and an effortless rock finish",
    },
    StyleCatalogEntry {
        key: "low-chignon",
        display_name: "Low Chignon",
        instruction: "An elegant low chignon bun at the nape with softly pulled-back sides",
    },
];

/// Stable per-session request id for the catalog entry at `index`.
pub fn look_id(index: usize) -> String {
    format!("look-{}", index)
}
