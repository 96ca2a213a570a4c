//! Text recognition by running the `tesseract` executable

use anyhow::{Context, Result, anyhow};
use image::RgbImage;
use roundscout_core::{TextRecognitionOracle, TextToken};
use std::process::Command;
use tempfile::NamedTempFile;

const TESSERACT: &str = "tesseract";

/// Single-line recognizer. Each call writes the crop to a temporary PNG and
/// reads back word-level TSV output.
pub struct TesseractOracle {
    lang: String,
    /// Page segmentation mode; 7 treats the image as one text line.
    psm: u8,
}

impl TesseractOracle {
    pub fn new(lang: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            psm: 7,
        }
    }
}

impl TextRecognitionOracle for TesseractOracle {
    fn recognize(&self, image: &RgbImage) -> Result<Vec<TextToken>> {
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image
            .save(temp_input.path())
            .context("Failed to write OCR input")?;

        // Tesseract appends .tsv to the output base
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let output = Command::new(TESSERACT)
            .arg(temp_input.path())
            .arg(&output_base)
            .arg("-l")
            .arg(&self.lang)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("tsv")
            .output()
            .with_context(|| format!("Failed to run {}", TESSERACT))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_words(&tsv))
    }
}

/// Word rows (level 5) with text and a non-negative confidence, scaled to `[0, 1]`.
pub fn parse_tsv_words(tsv: &str) -> Vec<TextToken> {
    tsv.lines()
        .skip(1)
        .filter_map(|line| {
            // level, page_num, block_num, par_num, line_num, word_num,
            // left, top, width, height, conf, text
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 12 || fields[0] != "5" {
                return None;
            }
            let conf: f32 = fields[10].trim().parse().ok()?;
            let text = fields[11].trim();
            (conf >= 0.0 && !text.is_empty()).then(|| TextToken::new(text, conf / 100.0))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tsv_words() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                   1\t1\t0\t0\t0\t0\t0\t0\t160\t80\t-1\t\n\
                   4\t1\t1\t1\t1\t0\t20\t10\t100\t50\t-1\t\n\
                   5\t1\t1\t1\t1\t1\t20\t10\t100\t50\t91.5\t1:40\n\
                   5\t1\t1\t1\t1\t2\t130\t10\t10\t50\t12\t \n\
                   5\t1\t1\t1\t1\t3\t140\t10\t10\t50\t40\tROUND\n";

        let tokens = parse_tsv_words(tsv);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "1:40");
        assert!((tokens[0].confidence - 0.915).abs() < 1e-6);
        assert_eq!(tokens[1].text, "ROUND");
    }
}
