/// Target dimensions for fitting `width`x`height` inside a `max`x`max` square.
///
/// Scales down only. The longer edge becomes `min(edge, max)`, the shorter
/// edge follows the aspect ratio (truncated), and both are clamped to
/// `[1, max]` afterwards.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }

    let aspect = f64::from(width) / f64::from(height);
    let (new_width, new_height) = if width > height {
        let w = width.min(max);
        (w, (f64::from(w) / aspect) as u32)
    } else {
        let h = height.min(max);
        ((f64::from(h) * aspect) as u32, h)
    };

    (new_width.clamp(1, max), new_height.clamp(1, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_images_are_untouched() {
        assert_eq!(fit_within(100, 100, 4000), (100, 100));
        assert_eq!(fit_within(4000, 4000, 4000), (4000, 4000));
        assert_eq!(fit_within(1, 1, 120), (1, 1));
    }

    #[test]
    fn test_landscape_scales_on_width() {
        assert_eq!(fit_within(8000, 6000, 4000), (4000, 3000));
        assert_eq!(fit_within(4000, 3000, 120), (120, 90));
    }

    #[test]
    fn test_portrait_scales_on_height() {
        assert_eq!(fit_within(3000, 6000, 4000), (2000, 4000));
        assert_eq!(fit_within(150, 200, 120), (90, 120));
    }

    #[test]
    fn test_square_scales_both() {
        assert_eq!(fit_within(5000, 5000, 4000), (4000, 4000));
    }

    #[test]
    fn test_shorter_edge_is_truncated() {
        // 1000 / (3000/1001) = 333.66...
        assert_eq!(fit_within(3000, 1001, 1000), (1000, 333));
    }

    #[test]
    fn test_extreme_aspect_never_collapses() {
        assert_eq!(fit_within(10000, 2, 120), (120, 1));
        assert_eq!(fit_within(1, 5000, 120), (1, 120));
    }
}
