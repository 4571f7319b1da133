//! Local `split_image`: cut a grid image into equally sized tiles.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use sf_core::StepType;

use super::{missing_input, resolve_media};
use crate::chain::ChainConfig;
use crate::context::StepContext;
use crate::executor::{resolve_params, StepExecutor};
use crate::input::{MediaRef, StepInput};
use crate::result::StepResult;
use crate::step::{param_str, param_usize, Params, Step};

const LOCAL_MODEL: &str = "local";

/// Parse a `"RxC"` grid spec (e.g. `"2x3"`).
pub fn parse_grid(spec: &str) -> Option<(u32, u32)> {
    let (rows, cols) = spec.trim().to_ascii_lowercase().split_once('x').map(|(r, c)| {
        (r.trim().parse::<u32>(), c.trim().parse::<u32>())
    })?;
    match (rows, cols) {
        (Ok(r), Ok(c)) if r > 0 && c > 0 => Some((r, c)),
        _ => None,
    }
}

/// Grid from `rows`/`cols` params, else `grid`, else 2x2.
pub(crate) fn grid_from_params(params: &Params) -> sf_core::Result<(u32, u32)> {
    if let (Some(rows), Some(cols)) = (param_usize(params, "rows"), param_usize(params, "cols")) {
        if rows == 0 || cols == 0 {
            return Err(sf_core::Error::Validation("rows and cols must be positive".into()));
        }
        return Ok((rows as u32, cols as u32));
    }
    match param_str(params, "grid") {
        Some(spec) => parse_grid(spec)
            .ok_or_else(|| sf_core::Error::Validation(format!("invalid grid '{spec}', expected RxC"))),
        None => Ok((2, 2)),
    }
}

/// Split one image file, writing tiles row by row. Blocking.
fn split_file(
    source: &Path,
    (rows, cols): (u32, u32),
    output_dir: &Path,
    stem: &str,
    first_tile: usize,
) -> sf_core::Result<Vec<PathBuf>> {
    let img = image::open(source)
        .map_err(|e| sf_core::Error::Image(format!("{}: {e}", source.display())))?;
    let (tile_w, tile_h) = (img.width() / cols, img.height() / rows);
    if tile_w == 0 || tile_h == 0 {
        return Err(sf_core::Error::Image(format!(
            "{} ({}x{}) is too small for a {rows}x{cols} grid",
            source.display(),
            img.width(),
            img.height()
        )));
    }

    std::fs::create_dir_all(output_dir)?;
    let mut tiles = Vec::with_capacity((rows * cols) as usize);
    for row in 0..rows {
        for col in 0..cols {
            let tile = img.crop_imm(col * tile_w, row * tile_h, tile_w, tile_h);
            let path = output_dir.join(format!("{stem}_tile_{}.png", first_tile + tiles.len() + 1));
            tile.save(&path)
                .map_err(|e| sf_core::Error::Image(format!("{}: {e}", path.display())))?;
            tiles.push(path);
        }
    }
    Ok(tiles)
}

/// Splits images locally; never calls a provider and costs nothing.
#[derive(Debug, Default)]
pub struct SplitImageExecutor;

impl SplitImageExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepExecutor for SplitImageExecutor {
    fn step_type(&self) -> StepType {
        StepType::SplitImage
    }

    async fn run(
        &self,
        step: &Step,
        input: &StepInput,
        chain: &ChainConfig,
        ctx: &StepContext,
    ) -> sf_core::Result<StepResult> {
        let started = Instant::now();
        let params = resolve_params(step, chain, &ctx.overrides, &[]);
        let grid = grid_from_params(&params)?;

        let media = resolve_media(input, chain.input_image.as_deref());
        if media.is_empty() {
            return Err(missing_input(&step.name, "image", input));
        }
        let mut sources = Vec::with_capacity(media.len());
        for item in media {
            match item {
                MediaRef::Path(path) => sources.push(path),
                MediaRef::Url(url) => {
                    return Ok(StepResult::failure(
                        LOCAL_MODEL,
                        format!("split_image needs a local file, got URL {url}"),
                        started.elapsed().as_secs_f64(),
                    ))
                }
            }
        }

        let output_dir = ctx.output_dir.clone();
        let stem = step.name.clone();
        let tiles = tokio::task::spawn_blocking(move || {
            let mut tiles = Vec::new();
            for source in &sources {
                let mut more = split_file(source, grid, &output_dir, &stem, tiles.len())?;
                tiles.append(&mut more);
            }
            Ok::<_, sf_core::Error>(tiles)
        })
        .await
        .map_err(|e| sf_core::Error::Internal(format!("split task failed: {e}")))??;

        tracing::info!(step = %step.name, tiles = tiles.len(), "Split {}x{} grid", grid.0, grid.1);

        let mut result = StepResult {
            success: true,
            output_paths: tiles,
            processing_time: started.elapsed().as_secs_f64(),
            model: LOCAL_MODEL.to_string(),
            ..StepResult::default()
        };
        result.metadata.insert("rows".into(), Value::from(grid.0));
        result.metadata.insert("cols".into(), Value::from(grid.1));
        Ok(result)
    }
}
