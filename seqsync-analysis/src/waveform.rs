//! Fixed-length waveform snippets rendered at onset positions

use crate::buffer::PcmBuffer;

/// Number of points in an onset snippet
pub const SNIPPET_POINTS: usize = 64;
/// Samples covered by an onset snippet
pub const SNIPPET_WINDOW: usize = 4096;
/// Amplitude that maps to the top of the snippet
pub const SNIPPET_CEILING: f32 = 0.8;

/// Shape of the rendered snippet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnippetConfig {
    pub points: usize,
    pub window: usize,
    pub ceiling: f32,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            points: SNIPPET_POINTS,
            window: SNIPPET_WINDOW,
            ceiling: SNIPPET_CEILING,
        }
    }
}

impl SnippetConfig {
    /// Samples reduced into each point
    pub fn samples_per_point(&self) -> usize {
        (self.window / self.points.max(1)).max(1)
    }
}

/// Render a peak-amplitude snippet starting at `start`
///
/// Each point is the largest absolute sample of its sub-window, clamped to the
/// ceiling and scaled into [0, 1]. Sub-windows that run past the end of the
/// buffer only use the samples that exist; points entirely past the end are 0.
pub fn render_snippet(buffer: &PcmBuffer, start: usize, config: &SnippetConfig) -> Vec<f32> {
    let samples = buffer.samples();
    let step = config.samples_per_point();
    let ceiling = if config.ceiling > 0.0 { config.ceiling } else { 1.0 };

    (0..config.points)
        .map(|point| {
            let from = start.saturating_add(point * step);
            let to = from.saturating_add(step).min(samples.len());
            let peak = samples
                .get(from..to)
                .unwrap_or(&[])
                .iter()
                .map(|s| s.abs())
                .filter(|s| s.is_finite())
                .fold(0.0f32, f32::max);
            peak.min(ceiling) / ceiling
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shape() {
        let config = SnippetConfig::default();
        assert_eq!(config.samples_per_point(), 64);
    }

    #[test]
    fn test_values_clamped_to_unit_range() {
        let samples: Vec<f32> = (0..8192).map(|i| if i % 2 == 0 { 3.0 } else { -0.2 }).collect();
        let buffer = PcmBuffer::new(samples, 44100).unwrap();
        let snippet = render_snippet(&buffer, 0, &SnippetConfig::default());

        assert_eq!(snippet.len(), SNIPPET_POINTS);
        assert!(snippet.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_eq!(snippet[0], 1.0);
    }

    #[test]
    fn test_scaled_by_ceiling() {
        let buffer = PcmBuffer::new(vec![0.4; 4096], 44100).unwrap();
        let snippet = render_snippet(&buffer, 0, &SnippetConfig::default());
        assert!((snippet[10] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_past_end_is_zero() {
        let buffer = PcmBuffer::new(vec![0.8; 100], 44100).unwrap();
        let snippet = render_snippet(&buffer, 50, &SnippetConfig::default());

        assert_eq!(snippet.len(), SNIPPET_POINTS);
        // First sub-window has 50 real samples
        assert_eq!(snippet[0], 1.0);
        assert!(snippet[1..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_start_beyond_buffer() {
        let buffer = PcmBuffer::new(vec![0.8; 100], 44100).unwrap();
        let snippet = render_snippet(&buffer, 10_000, &SnippetConfig::default());
        assert!(snippet.iter().all(|&v| v == 0.0));
    }
}
