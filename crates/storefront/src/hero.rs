//! Home page hero section.
//!
//! The layout is chosen by a string key in the site configuration so
//! merchandisers can switch it without a deploy. Parsing is total: anything
//! unrecognized renders the classic layout.

use serde::{Deserialize, Serialize};

/// Hero layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HeroVariant {
    /// Full-width image with overlaid copy.
    #[default]
    Classic,
    /// Copy on one side, image on the other.
    Split,
    /// Copy centered over a tinted background.
    Centered,
    /// Rotating slides.
    Carousel,
    /// Background video with overlaid copy.
    Video,
    /// Copy only.
    Minimal,
}

impl HeroVariant {
    /// Parse a configuration key, falling back to [`HeroVariant::Classic`].
    #[must_use]
    pub fn parse(key: &str) -> Self {
        let normalized = key.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "classic" | "default" => Self::Classic,
            "split" | "split-left" | "split_left" | "image-left" => Self::Split,
            "centered" => Self::Centered,
            "carousel" | "slider" => Self::Carousel,
            "video" => Self::Video,
            "minimal" => Self::Minimal,
            other => {
                tracing::debug!(key = other, "Unknown hero variant, using classic");
                Self::Classic
            }
        }
    }

    /// Canonical key, used by templates to pick a block.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Split => "split",
            Self::Centered => "centered",
            Self::Carousel => "carousel",
            Self::Video => "video",
            Self::Minimal => "minimal",
        }
    }
}

/// Hero copy and media from the site configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeroContent {
    pub eyebrow: Option<String>,
    #[serde(alias = "heading")]
    pub title: Option<String>,
    #[serde(alias = "subheading")]
    pub subtitle: Option<String>,
    #[serde(alias = "button_text")]
    pub cta_text: Option<String>,
    #[serde(alias = "button_url")]
    pub cta_url: Option<String>,
    #[serde(alias = "image")]
    pub image_url: Option<String>,
    #[serde(alias = "slides")]
    pub images: Vec<String>,
    pub video_url: Option<String>,
}

/// Everything the hero template needs.
#[derive(Debug, Clone)]
pub struct HeroView {
    pub variant: HeroVariant,
    /// Same as `variant.as_str()`; templates compare against it.
    pub key: &'static str,
    pub eyebrow: String,
    pub title: String,
    pub subtitle: String,
    pub cta_text: String,
    pub cta_url: String,
    pub image_url: Option<String>,
    /// Carousel slides: the primary image followed by the secondary images.
    pub slides: Vec<String>,
    pub video_url: Option<String>,
}

impl HeroView {
    /// Combine a variant key with hero content.
    ///
    /// `store_name` is the title used when the content has none.
    #[must_use]
    pub fn new(variant_key: &str, content: &HeroContent, store_name: &str) -> Self {
        let mut variant = HeroVariant::parse(variant_key);
        let text = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or_default().to_string();

        let slides: Vec<String> = content
            .image_url
            .iter()
            .chain(content.images.iter())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        let video_url = content
            .video_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        if variant == HeroVariant::Video && video_url.is_none() {
            tracing::debug!("Video hero configured without a video URL, using classic");
            variant = HeroVariant::Classic;
        }

        let title = text(&content.title);
        let cta_url = text(&content.cta_url);

        Self {
            variant,
            key: variant.as_str(),
            eyebrow: text(&content.eyebrow),
            title: if title.is_empty() {
                store_name.to_string()
            } else {
                title
            },
            subtitle: text(&content.subtitle),
            cta_text: text(&content.cta_text),
            cta_url: if cta_url.is_empty() {
                "/products".to_string()
            } else {
                cta_url
            },
            image_url: slides.first().cloned(),
            slides,
            video_url,
        }
    }

    /// Whether a call-to-action button is shown.
    #[must_use]
    pub fn has_cta(&self) -> bool {
        !self.cta_text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_variants() {
        assert_eq!(HeroVariant::parse("classic"), HeroVariant::Classic);
        assert_eq!(HeroVariant::parse("split"), HeroVariant::Split);
        assert_eq!(HeroVariant::parse("centered"), HeroVariant::Centered);
        assert_eq!(HeroVariant::parse("carousel"), HeroVariant::Carousel);
        assert_eq!(HeroVariant::parse("video"), HeroVariant::Video);
        assert_eq!(HeroVariant::parse("minimal"), HeroVariant::Minimal);
    }

    #[test]
    fn test_parse_aliases() {
        for alias in ["split-left", "split_left", "image-left", " Split "] {
            assert_eq!(HeroVariant::parse(alias), HeroVariant::Split, "{alias}");
        }
        assert_eq!(HeroVariant::parse("slider"), HeroVariant::Carousel);
    }

    #[test]
    fn test_parse_is_total() {
        assert_eq!(HeroVariant::parse(""), HeroVariant::Classic);
        assert_eq!(HeroVariant::parse("parallax"), HeroVariant::Classic);
    }

    #[test]
    fn test_view_collects_slides() {
        let content = HeroContent {
            image_url: Some("/a.jpg".into()),
            images: vec!["/b.jpg".into(), "  ".into()],
            ..HeroContent::default()
        };
        let view = HeroView::new("slider", &content, "Larkspur");
        assert_eq!(view.key, "carousel");
        assert_eq!(view.slides, vec!["/a.jpg".to_string(), "/b.jpg".to_string()]);
        assert_eq!(view.title, "Larkspur");
        assert_eq!(view.cta_url, "/products");
    }

    #[test]
    fn test_video_without_url_falls_back() {
        let view = HeroView::new("video", &HeroContent::default(), "Larkspur");
        assert_eq!(view.variant, HeroVariant::Classic);
    }
}
