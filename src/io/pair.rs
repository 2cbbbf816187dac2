//! `pair.txt` view-selection lists.
//!
//! ```text
//! <num_images>
//! <ref_id>
//! <n> <src_id> <score> <src_id> <score> ...
//! ...
//! ```
use crate::error::InputError;
use crate::problem::Problem;
use std::fs;
use std::path::Path;

/// Parse a pair file; source lists are truncated to `max_sources` when given.
pub fn read_pair_file(path: &Path, max_sources: Option<usize>) -> Result<Vec<Problem>, InputError> {
    let text = fs::read_to_string(path).map_err(|e| InputError::io(path, e))?;
    parse_pairs(&text, max_sources).map_err(|message| InputError::parse(path, message))
}

fn next_token<'a>(tokens: &mut std::str::SplitWhitespace<'a>, what: &str) -> Result<&'a str, String> {
    tokens.next().ok_or_else(|| format!("missing {what}"))
}

fn next_usize(tokens: &mut std::str::SplitWhitespace<'_>, what: &str) -> Result<usize, String> {
    let t = next_token(tokens, what)?;
    t.parse::<usize>()
        .map_err(|e| format!("invalid {what} '{t}': {e}"))
}

fn parse_pairs(text: &str, max_sources: Option<usize>) -> Result<Vec<Problem>, String> {
    let mut tokens = text.split_whitespace();
    let num_images = next_usize(&mut tokens, "image count")?;
    let mut problems = Vec::with_capacity(num_images);
    for _ in 0..num_images {
        let ref_image_id = next_usize(&mut tokens, "reference id")?;
        let num_src = next_usize(&mut tokens, "source count")?;
        let mut src_image_ids = Vec::with_capacity(num_src);
        for _ in 0..num_src {
            src_image_ids.push(next_usize(&mut tokens, "source id")?);
            let score = next_token(&mut tokens, "view score")?;
            score
                .parse::<f32>()
                .map_err(|e| format!("invalid view score '{score}': {e}"))?;
        }
        if let Some(max) = max_sources {
            src_image_ids.truncate(max);
        }
        problems.push(Problem::new(ref_image_id, src_image_ids));
    }
    Ok(problems)
}
