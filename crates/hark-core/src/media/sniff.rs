//! Content sniffing for downloaded media.

use infer::MatcherType;

/// A sniffed media payload accepted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaKind {
    pub mime_type: &'static str,
    pub extension: &'static str,
}

/// Classify `bytes` as audio or video.
///
/// Returns `Err` with the detected MIME type (or `unknown`) for anything else.
pub fn sniff_media(bytes: &[u8]) -> Result<MediaKind, String> {
    match infer::get(bytes) {
        Some(kind) if matches!(kind.matcher_type(), MatcherType::Audio | MatcherType::Video) => {
            Ok(MediaKind {
                mime_type: kind.mime_type(),
                extension: kind.extension(),
            })
        }
        Some(kind) => Err(kind.mime_type().to_string()),
        None => Err("unknown".to_string()),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn accepts_wav_audio() {
        let kind = sniff_media(&wav_bytes()).unwrap();
        assert_eq!(kind.extension, "wav");
    }

    #[test]
    fn accepts_mp4_video() {
        let kind = sniff_media(&mp4_bytes()).unwrap();
        assert_eq!(kind.extension, "mp4");
        assert_eq!(kind.mime_type, "video/mp4");
    }

    #[test]
    fn rejects_images_with_detected_type() {
        assert_eq!(sniff_media(&png_bytes()), Err("image/png".to_string()));
    }

    #[test]
    fn rejects_unknown_bytes() {
        assert_eq!(sniff_media(b"hello world"), Err("unknown".to_string()));
    }
}
