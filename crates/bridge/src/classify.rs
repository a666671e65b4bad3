//! Decides whether a bus payload is an image link or plain text.
//!
//! Matching is purely syntactic: no request is made to the URL. The whole
//! payload must be the URL, so a sentence that merely contains an image link
//! stays text.

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;

/// `http(s)://host[:port]/path/name.<ext>[?query]`, case-insensitive.
#[allow(clippy::expect_used)]
static IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^https?://[a-z0-9](?:[a-z0-9.-]*[a-z0-9])?(?::(?P<port>\d{1,5}))?/(?:[^\s?#]*/)?[^\s?#/]*\.(?P<ext>jpe?g|png|gif|webp)(?:\?[^\s#]*)?$",
    )
    .expect("image url pattern is valid")
});

/// Image formats the bridge forwards as media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageExtension {
    Jpg,
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageExtension {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }

    /// GIFs are sent as animations so Telegram plays them.
    pub fn is_animation(self) -> bool {
        matches!(self, Self::Gif)
    }
}

impl fmt::Display for ImageExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageExtension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" => Ok(Self::Jpg),
            "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "gif" => Ok(Self::Gif),
            "webp" => Ok(Self::Webp),
            other => Err(format!("unsupported image extension: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Text(String),
    Image {
        url: String,
        extension: ImageExtension,
    },
}

/// Classify a decoded bus payload.
pub fn classify(payload: &str) -> Classification {
    let candidate = payload.trim();
    let extension = IMAGE_URL
        .captures(candidate)
        .filter(|caps| {
            caps.name("port")
                .is_none_or(|port| port.as_str().parse::<u16>().is_ok())
        })
        .and_then(|caps| caps.name("ext"))
        .and_then(|ext| ext.as_str().parse::<ImageExtension>().ok());

    match extension {
        Some(extension) => Classification::Image {
            url: candidate.to_string(),
            extension,
        },
        None => Classification::Text(payload.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("https://x.com/a.png", ImageExtension::Png)]
    #[case("https://x.com/a.png?x=1", ImageExtension::Png)]
    #[case("http://x.com/a.jpg", ImageExtension::Jpg)]
    #[case("https://cdn.example.org:8443/img/cat.JPEG", ImageExtension::Jpeg)]
    #[case("HTTPS://Example.com/anim/loop.gif", ImageExtension::Gif)]
    #[case("https://192.168.1.10/snap/latest.webp?size=large&t=1", ImageExtension::Webp)]
    #[case("  https://x.com/a.png\n", ImageExtension::Png)]
    #[case("http://camera.local:65535/snap.jpg", ImageExtension::Jpg)]
    fn image_urls(#[case] payload: &str, #[case] ext: ImageExtension) {
        match classify(payload) {
            Classification::Image { url, extension } => {
                assert_eq!(extension, ext);
                assert_eq!(url, payload.trim());
            },
            other => panic!("expected image for {payload:?}, got {other:?}"),
        }
    }

    #[rstest]
    #[case("hello world")]
    #[case("ftp://x.com/a.png")]
    #[case("https://x.com/a.pdf")]
    #[case("https://x.com/")]
    #[case("https://x.com/a.png#frag")]
    #[case("see https://x.com/a.png")]
    #[case("https://x.com/a.png and more")]
    #[case("https://x.com/png")]
    #[case("https:///a.png")]
    #[case("http://camera.local:65536/snap.jpg")]
    #[case("http://camera.local:99999/snap.jpg")]
    #[case("")]
    fn text_payloads(#[case] payload: &str) {
        assert_eq!(classify(payload), Classification::Text(payload.to_string()));
    }

    #[test]
    fn classification_is_idempotent() {
        for payload in ["https://x.com/a.gif", "temperature=21.5"] {
            assert_eq!(classify(payload), classify(payload));
        }
    }

    #[test]
    fn gif_is_the_only_animation() {
        assert!(ImageExtension::Gif.is_animation());
        assert!(!ImageExtension::Png.is_animation());
        assert!(!ImageExtension::Webp.is_animation());
    }
}
