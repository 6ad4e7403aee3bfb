use std::fmt;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::{FaceId, FontFace, FontFallback};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeFontId(pub Uuid);

#[derive(Clone)]
pub struct TypefaceEntry {
    pub name: String,
    pub face: Arc<dyn FontFace>,
}

impl fmt::Debug for TypefaceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypefaceEntry")
            .field("name", &self.name)
            .field("face", &self.face.name())
            .finish()
    }
}

/// Named faces of one family, e.g. "Regular" and "Bold".
#[derive(Debug, Clone, Default)]
pub struct Typeface {
    pub fonts: Vec<TypefaceEntry>,
}

impl Typeface {
    pub fn single(name: impl Into<String>, face: Arc<dyn FontFace>) -> Self {
        Self {
            fonts: vec![TypefaceEntry {
                name: name.into(),
                face,
            }],
        }
    }

    pub fn with_font(mut self, name: impl Into<String>, face: Arc<dyn FontFace>) -> Self {
        self.fonts.push(TypefaceEntry {
            name: name.into(),
            face,
        });
        self
    }

    /// Entry matching `name`, or the first entry.
    pub fn face(&self, name: Option<&str>) -> Option<&Arc<dyn FontFace>> {
        name.and_then(|name| self.fonts.iter().find(|e| e.name == name))
            .or_else(|| self.fonts.first())
            .map(|e| &e.face)
    }
}

/// Typeface used for specific code point ranges, e.g. CJK.
#[derive(Debug, Clone)]
pub struct SubTypeface {
    pub character_ranges: Vec<RangeInclusive<u32>>,
    pub typeface: Typeface,
}

impl SubTypeface {
    pub fn covers(&self, ch: char) -> bool {
        let code = ch as u32;
        self.character_ranges.iter().any(|r| r.contains(&code))
    }
}

/// A face chosen for a character plus the glyph to draw.
#[derive(Clone)]
pub struct ResolvedFace {
    pub face: Arc<dyn FontFace>,
    pub glyph_index: u32,
    pub fallback_level: FontFallback,
}

impl fmt::Debug for ResolvedFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedFace")
            .field("face", &self.face.name())
            .field("glyph_index", &self.glyph_index)
            .field("fallback_level", &self.fallback_level)
            .finish()
    }
}

/// A default typeface, optional per-range sub typefaces and an optional
/// fallback typeface, resolved per character.
pub struct CompositeFont {
    id: CompositeFontId,
    default_typeface: Typeface,
    sub_typefaces: Vec<SubTypeface>,
    fallback_typeface: Option<Typeface>,
    history_revision: AtomicU32,
}

impl fmt::Debug for CompositeFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeFont")
            .field("id", &self.id)
            .field("default_typeface", &self.default_typeface)
            .field("sub_typefaces", &self.sub_typefaces.len())
            .field("history_revision", &self.history_revision())
            .finish()
    }
}

impl CompositeFont {
    pub fn new(default_typeface: Typeface) -> Self {
        Self {
            id: CompositeFontId(Uuid::new_v4()),
            default_typeface,
            sub_typefaces: Vec::new(),
            fallback_typeface: None,
            history_revision: AtomicU32::new(0),
        }
    }

    pub fn with_sub_typeface(mut self, sub_typeface: SubTypeface) -> Self {
        self.sub_typefaces.push(sub_typeface);
        self
    }

    pub fn with_fallback_typeface(mut self, typeface: Typeface) -> Self {
        self.fallback_typeface = Some(typeface);
        self
    }

    pub fn id(&self) -> CompositeFontId {
        self.id
    }

    /// Bumped whenever the font's definition changes; caches keyed on this
    /// font compare it to decide staleness.
    pub fn history_revision(&self) -> u32 {
        self.history_revision.load(Ordering::Acquire)
    }

    pub fn bump_history_revision(&self) -> u32 {
        self.history_revision.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn default_typeface(&self) -> &Typeface {
        &self.default_typeface
    }

    /// Typeface whose ranges claim `ch`, the default typeface otherwise.
    pub fn typeface_for_char(&self, ch: char) -> &Typeface {
        self.sub_typefaces
            .iter()
            .find(|sub| sub.covers(ch))
            .map(|sub| &sub.typeface)
            .unwrap_or(&self.default_typeface)
    }

    /// The face used for metrics of the font as a whole.
    pub fn primary_face(&self, typeface_name: Option<&str>) -> Option<&Arc<dyn FontFace>> {
        self.default_typeface.face(typeface_name)
    }

    pub fn faces(&self) -> impl Iterator<Item = &Arc<dyn FontFace>> + '_ {
        self.default_typeface
            .fonts
            .iter()
            .chain(self.sub_typefaces.iter().flat_map(|s| s.typeface.fonts.iter()))
            .chain(self.fallback_typeface.iter().flat_map(|t| t.fonts.iter()))
            .map(|e| &e.face)
    }

    pub fn face_by_id(&self, id: FaceId) -> Option<&Arc<dyn FontFace>> {
        self.faces().find(|face| face.id() == id)
    }

    /// Walks the fallback chain for `ch` no further than `max_fallback`.
    pub fn resolve_face(
        &self,
        typeface_name: Option<&str>,
        ch: char,
        max_fallback: FontFallback,
    ) -> Option<ResolvedFace> {
        let found = |face: &Arc<dyn FontFace>, level: FontFallback| {
            face.glyph_index(ch).map(|glyph_index| ResolvedFace {
                face: face.clone(),
                glyph_index,
                fallback_level: level,
            })
        };

        if let Some(resolved) = self
            .typeface_for_char(ch)
            .face(typeface_name)
            .and_then(|face| found(face, FontFallback::NoFallback))
        {
            return Some(resolved);
        }
        if max_fallback < FontFallback::LocalizedFallback {
            return None;
        }

        if let Some(resolved) = self
            .fallback_typeface
            .as_ref()
            .and_then(|t| t.face(typeface_name))
            .and_then(|face| found(face, FontFallback::LocalizedFallback))
        {
            return Some(resolved);
        }
        if max_fallback < FontFallback::LastResortFallback {
            return None;
        }

        if let Some(resolved) = self
            .faces()
            .find_map(|face| found(face, FontFallback::LastResortFallback))
        {
            return Some(resolved);
        }

        // not-defined glyph of the primary face
        self.primary_face(typeface_name).map(|face| ResolvedFace {
            face: face.clone(),
            glyph_index: 0,
            fallback_level: FontFallback::LastResortFallback,
        })
    }
}
