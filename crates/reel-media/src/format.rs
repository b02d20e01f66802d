//! Output format classification.

use reel_models::CanonicalFormat;

/// Allowed distance between a measured ratio and a canonical one.
pub const RATIO_TOLERANCE: f64 = 0.1;

/// Pick the canonical format closest to an image's aspect ratio.
///
/// Ratios within `RATIO_TOLERANCE` of 9:16, 16:9 or 1:1 map to that format
/// (checked in that order); anything else falls back to vertical when
/// portrait and horizontal otherwise.
pub fn classify(width: u32, height: u32) -> CanonicalFormat {
    if width == 0 || height == 0 {
        return CanonicalFormat::Vertical;
    }

    let ratio = width as f64 / height as f64;

    if (ratio - 9.0 / 16.0).abs() < RATIO_TOLERANCE {
        CanonicalFormat::Vertical
    } else if (ratio - 16.0 / 9.0).abs() < RATIO_TOLERANCE {
        CanonicalFormat::Horizontal
    } else if (ratio - 1.0).abs() < RATIO_TOLERANCE {
        CanonicalFormat::Square
    } else if ratio < 1.0 {
        CanonicalFormat::Vertical
    } else {
        CanonicalFormat::Horizontal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_ratios() {
        assert_eq!(classify(1080, 1920), CanonicalFormat::Vertical);
        assert_eq!(classify(1920, 1080), CanonicalFormat::Horizontal);
        assert_eq!(classify(1080, 1080), CanonicalFormat::Square);
    }

    #[test]
    fn test_near_ratios() {
        assert_eq!(classify(720, 1280), CanonicalFormat::Vertical);
        assert_eq!(classify(1280, 720), CanonicalFormat::Horizontal);
        assert_eq!(classify(1000, 950), CanonicalFormat::Square);
    }

    #[test]
    fn test_defaults_outside_tolerance() {
        // 0.833 is outside all three tolerances
        assert_eq!(classify(1000, 1200), CanonicalFormat::Vertical);
        // 4:3
        assert_eq!(classify(1600, 1200), CanonicalFormat::Horizontal);
        // very wide panorama
        assert_eq!(classify(4000, 1000), CanonicalFormat::Horizontal);
        // very tall strip
        assert_eq!(classify(300, 3000), CanonicalFormat::Vertical);
    }

    #[test]
    fn test_degenerate_dimensions() {
        assert_eq!(classify(0, 1080), CanonicalFormat::Vertical);
        assert_eq!(classify(1080, 0), CanonicalFormat::Vertical);
    }
}
