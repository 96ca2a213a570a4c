//! Masked normalized correlation of agent templates against a map image

use super::{AgentTemplate, ScaledTemplate, TemplateConfig};
use crate::bbox::{BBox, BBoxCollection};
use crate::traits::TemplateMatchable;
use crate::utils::PreparedImage;
use image::RgbImage;
use imageproc::template_matching::{MatchTemplateMethod, match_template};
use log::debug;

const EPSILON: f64 = 1e-9;

/// Channel-averaged correlation surface of one template over one image.
///
/// `scores[y * width + x]` is the score with the template's top-left corner at `(x, y)`.
#[derive(Debug, Clone)]
pub struct Response {
    pub width: u32,
    pub height: u32,
    pub scores: Vec<f64>,
}

/// Template matcher over RGB planes.
///
/// Each channel is scored with the mean-subtracted normalized correlation
/// coefficient and the three channel scores are averaged.
pub struct TemplateMatcher {
    config: TemplateConfig,
}

impl TemplateMatcher {
    pub fn new(config: TemplateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    /// Correlation surface, or `None` when the template does not fit the image.
    pub fn response(&self, image: &PreparedImage, template: &ScaledTemplate) -> Option<Response> {
        if template.is_empty() || template.width > image.width || template.height > image.height {
            return None;
        }

        let width = image.width - template.width + 1;
        let height = image.height - template.height + 1;
        let mut scores = vec![0.0; (width * height) as usize];

        for c in 0..3 {
            let channel = correlate_channel(image, template, c, width, height);
            for (acc, v) in scores.iter_mut().zip(channel) {
                *acc += v / 3.0;
            }
        }

        Some(Response {
            width,
            height,
            scores,
        })
    }

    /// Raw hits of one scaled template at or above the configured threshold
    pub fn match_scaled(
        &self,
        image: &PreparedImage,
        agent_name: &str,
        template: &ScaledTemplate,
    ) -> BBoxCollection {
        self.match_template(image, template, self.config.threshold)
            .into_iter()
            .map(|bbox| bbox.with_agent(agent_name))
            .collect()
    }

    /// Match every agent at every scale and suppress overlaps.
    ///
    /// Hits from all `(agent, scale)` pairs are pooled before the single global
    /// NMS pass.
    pub fn match_all(&self, image: &RgbImage, templates: &[AgentTemplate]) -> BBoxCollection {
        let prepared = PreparedImage::new(image);
        let pairs: Vec<(&str, &ScaledTemplate)> = templates
            .iter()
            .flat_map(|t| t.scales.iter().map(move |s| (t.name.as_str(), s)))
            .collect();

        #[cfg(feature = "parallel")]
        let per_pair: Vec<BBoxCollection> = {
            use rayon::prelude::*;
            pairs
                .par_iter()
                .map(|(name, template)| self.match_scaled(&prepared, name, template))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let per_pair: Vec<BBoxCollection> = pairs
            .iter()
            .map(|(name, template)| self.match_scaled(&prepared, name, template))
            .collect();

        let mut pooled = BBoxCollection::new();
        for hits in per_pair {
            pooled.extend(hits);
        }

        let raw = pooled.len();
        let kept = pooled.apply_nms(self.config.nms_threshold);
        debug!("{} raw matches, {} after NMS", raw, kept.len());
        kept
    }
}

impl TemplateMatchable for TemplateMatcher {
    fn match_template(
        &self,
        image: &PreparedImage,
        template: &ScaledTemplate,
        threshold: f64,
    ) -> Vec<BBox> {
        let Some(response) = self.response(image, template) else {
            return Vec::new();
        };

        let mut hits = Vec::new();
        for y in 0..response.height {
            for x in 0..response.width {
                let score = response.scores[(y * response.width + x) as usize];
                if score >= threshold {
                    hits.push(BBox::new(
                        x as i32,
                        y as i32,
                        template.width as i32,
                        template.height as i32,
                        score,
                    ));
                }
            }
        }
        hits
    }
}

impl Default for TemplateMatcher {
    fn default() -> Self {
        Self::new(TemplateConfig::default())
    }
}

/// Normalized correlation coefficient of channel `c` at every placement.
///
/// The raw cross-correlation comes from imageproc; the template mean is
/// subtracted through the window sums. Placements where the image window or
/// the template is flat score 0.
fn correlate_channel(
    image: &PreparedImage,
    template: &ScaledTemplate,
    c: usize,
    out_width: u32,
    out_height: u32,
) -> Vec<f64> {
    let stats = template.stats[c];
    let mut out = vec![0.0; (out_width * out_height) as usize];
    if stats.norm <= EPSILON {
        return out;
    }

    let cross = match_template(
        &image.channels[c],
        &template.channels[c],
        MatchTemplateMethod::CrossCorrelation,
    );
    let n = template.width as u128 * template.height as u128;

    for y in 0..out_height {
        for x in 0..out_width {
            let (sum, sq_sum) = image.window(c, x, y, template.width, template.height);
            // n * sum(I^2) - sum(I)^2, exact in integers
            let spread = n * sq_sum as u128 - sum as u128 * sum as u128;
            if spread == 0 {
                continue;
            }

            let variance = spread as f64 / n as f64;
            let denom = (stats.norm * variance).sqrt();
            let numerator = cross.get_pixel(x, y)[0] as f64 - stats.mean * sum as f64;
            out[(y * out_width + x) as usize] = numerator / denom;
        }
    }
    out
}
