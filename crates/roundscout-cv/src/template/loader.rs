//! Template loading utilities

use super::{AgentTemplate, AgentTemplateSet, TEMPLATE_SIZES};
use crate::Result;
use crate::utils::image::ImageUtils;
use anyhow::Context;
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

const ICON_EXTENSION: &str = "png";

/// Builds an [`AgentTemplateSet`] from a directory of agent icons.
///
/// The file stem is the agent name (`jett.png` -> `jett`).
pub struct TemplateLoader {
    template_dirs: Vec<PathBuf>,
    sizes: Vec<u32>,
}

impl TemplateLoader {
    pub fn new() -> Self {
        Self {
            template_dirs: Vec::new(),
            sizes: TEMPLATE_SIZES.to_vec(),
        }
    }

    pub fn add_template_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.template_dirs.push(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_sizes(mut self, sizes: &[u32]) -> Self {
        self.sizes = sizes.to_vec();
        self
    }

    /// Load every icon in the template directories.
    ///
    /// A missing directory is logged and contributes nothing; an unreadable
    /// icon is skipped with a warning.
    pub fn load_all_templates(&self) -> Result<AgentTemplateSet> {
        let mut templates = Vec::new();

        for path in self.icon_paths()? {
            let Some(stem) = path.file_stem() else { continue };
            let name = stem.to_string_lossy().to_string();

            match ImageUtils::load_rgba(&path) {
                Ok((image, has_alpha)) => {
                    let template = AgentTemplate::from_master(name, &image, has_alpha, &self.sizes);
                    debug!(
                        "Loaded {}: {:?}",
                        template.name,
                        template.scales.iter().map(|s| (s.width, s.height)).collect::<Vec<_>>()
                    );
                    templates.push(template);
                }
                Err(e) => warn!("Failed to load {:?}: {:#}", path, e),
            }
        }

        let set = AgentTemplateSet::new(templates);
        info!("Loaded {} agent templates", set.len());
        Ok(set)
    }

    /// Icon files across all directories, sorted by file name
    fn icon_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        for dir in &self.template_dirs {
            if !dir.exists() {
                error!("Icons directory not found: {:?}", dir);
                continue;
            }

            let entries = fs::read_dir(dir)
                .with_context(|| format!("Failed to read directory: {:?}", dir))?;

            for entry in entries {
                let path = entry?.path();
                let supported = path
                    .extension()
                    .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(ICON_EXTENSION));
                if supported && path.is_file() {
                    paths.push(path);
                }
            }
        }

        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(paths)
    }
}

impl Default for TemplateLoader {
    fn default() -> Self {
        Self::new()
    }
}
