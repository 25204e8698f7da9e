//! Rendering options and configuration.

/// Resolution used when part of a vector page has to be rasterized.
pub const DEFAULT_FALLBACK_DPI: f64 = 150.0;

/// Maximum nesting of form XObjects.
pub const DEFAULT_MAX_FORM_DEPTH: usize = 16;

/// How page space maps onto a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderScale {
    /// Uniform factor from points to target units.
    Factor(f64),
    /// Largest uniform scale that fits the page inside the box.
    FitBox { width: f64, height: f64 },
}

impl Default for RenderScale {
    fn default() -> Self {
        RenderScale::Factor(1.0)
    }
}

impl RenderScale {
    /// Scale factor for a page of the given intrinsic size, or `None` if
    /// the page or the box has no usable size.
    pub fn factor_for(&self, page_width: f64, page_height: f64) -> Option<f64> {
        let usable = |v: f64| v.is_finite() && v > 0.0;
        if !usable(page_width) || !usable(page_height) {
            return None;
        }
        let factor = match *self {
            RenderScale::Factor(f) => f,
            RenderScale::FitBox { width, height } => {
                if !usable(width) || !usable(height) {
                    return None;
                }
                (width / page_width).min(height / page_height)
            }
        };
        usable(factor).then_some(factor)
    }
}

/// Options for the page renderer.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// DPI for content a vector target has to rasterize
    pub fallback_resolution: f64,

    /// Form XObject nesting limit
    pub max_form_depth: usize,
}

impl RenderOptions {
    /// Create new render options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback rasterization resolution.
    pub fn with_fallback_resolution(mut self, dpi: f64) -> Self {
        if dpi.is_finite() && dpi > 0.0 {
            self.fallback_resolution = dpi;
        }
        self
    }

    /// Set the form XObject nesting limit.
    pub fn with_max_form_depth(mut self, depth: usize) -> Self {
        self.max_form_depth = depth;
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            fallback_resolution: DEFAULT_FALLBACK_DPI,
            max_form_depth: DEFAULT_MAX_FORM_DEPTH,
        }
    }
}
