use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fetch::{FetchError, Fetcher};
use crate::opinion::{truncate_chars, Opinion, TEXT_CAP};

#[derive(Error, Debug)]
pub enum TextError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("pdf text extraction failed: {0}")]
    Pdf(String),
}

/// Download one opinion document and return its text, capped.
///
/// Non-PDF responses (HTML landing pages, error pages served as 200) give
/// an empty string.
pub async fn document_text(fetcher: &dyn Fetcher, url: &str) -> Result<String, TextError> {
    let fetched = fetcher.fetch(url).await?.ensure_success()?;
    if !fetched.is_pdf() {
        debug!(
            "Skipping non-PDF document {} ({})",
            url,
            fetched.content_type.as_deref().unwrap_or("no content type")
        );
        return Ok(String::new());
    }
    let raw = pdf_extract::extract_text_from_mem(&fetched.body).map_err(|e| TextError::Pdf(e.to_string()))?;
    Ok(clean_text(&raw))
}

/// Trim each line, drop runs of blank lines, cap the length.
pub fn clean_text(raw: &str) -> String {
    let mut out = String::new();
    let mut blank_run = 0;
    for line in raw.lines().map(str::trim) {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    truncate_chars(out.trim_end(), TEXT_CAP)
}

/// Fill `text_content` for opinions that have a document link but no text.
///
/// Sequential, with `delay` between downloads. Failures leave the text empty.
/// Returns how many opinions gained text.
pub async fn enrich_text(fetcher: &dyn Fetcher, opinions: &mut [Opinion], delay: Duration) -> usize {
    let pending: Vec<usize> = opinions
        .iter()
        .enumerate()
        .filter(|(_, o)| o.text_content.is_empty() && !o.pdf_url.is_empty())
        .map(|(i, _)| i)
        .collect();
    if pending.is_empty() {
        return 0;
    }

    let pb = ProgressBar::new(pending.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("=> "));
    }

    let mut filled = 0usize;
    for (n, idx) in pending.iter().enumerate() {
        if n > 0 {
            tokio::time::sleep(delay).await;
        }
        let opinion = &mut opinions[*idx];
        pb.set_message(opinion.display_number().to_string());
        match document_text(fetcher, &opinion.pdf_url).await {
            Ok(text) if !text.is_empty() => {
                opinion.text_content = text;
                filled += 1;
            }
            Ok(_) => {}
            Err(e) => warn!("Error extracting PDF for {}: {}", opinion.display_number(), e),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!("Extracted text for {}/{} opinions", filled, pending.len());
    filled
}
