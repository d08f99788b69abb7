// Copyright (c) 2018-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.
#![deny(missing_docs)]

use crate::api::config::*;
use crate::context::{AdaptiveBitEstimator, EntropyEstimator};
use crate::encoder::{encode_tile, CtuDecision, FrameInvariants};
use crate::frame::{Frame, FrameMaps};
use crate::partition::{SliceType, PLANES, REFP_NUM};
use crate::predict::Analyzers;
use crate::quantize::{QpOffsetMap, MAX_QP};
use crate::stats::SearchStats;
use crate::tiling::{TileFrame, TileState};
use crate::util::{copy_rect, ChromaSampling, Pixel};

use rayon::prelude::*;
use thiserror::Error;

use std::sync::Arc;

/// The search context.
///
/// Holds the validated configuration and the collaborators used for every
/// picture. Pictures are independent: no state is carried from one
/// [`search_picture`] call to the next.
///
/// [`search_picture`]: #method.search_picture
pub struct Context<T: Pixel, E: EntropyEstimator = AdaptiveBitEstimator> {
  config: Arc<EncoderConfig>,
  tiling: TilingInfo,
  tools: Analyzers<T>,
  est: E,
}

/// Errors returned by [`Context::search_picture`].
///
/// [`Context::search_picture`]: struct.Context.html#method.search_picture
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum SearchError {
  /// A picture does not have the configured size.
  #[error(
    "picture is {width}x{height}, expected \
     {expected_width}x{expected_height}"
  )]
  DimensionMismatch {
    /// Width of the picture.
    width: usize,
    /// Height of the picture.
    height: usize,
    /// Configured width.
    expected_width: usize,
    /// Configured height.
    expected_height: usize,
  },
  /// A picture does not have the configured chroma sampling.
  #[error("picture chroma sampling does not match {0:?}")]
  ChromaSamplingMismatch(ChromaSampling),
  /// An inter slice was given no reference picture.
  #[error("{0:?} slice without a reference picture")]
  MissingReference(SliceType),
  /// The picture QP is out of range.
  #[error("invalid QP {0} (expected <= 51)")]
  InvalidQp(u8),
  /// The QP offset map does not cover the picture.
  #[error("QP offset map is {width}x{height}, not the picture size")]
  QpOffsetMismatch {
    /// Width of the map.
    width: usize,
    /// Height of the map.
    height: usize,
  },
}

/// A picture to search, with its references.
#[derive(Debug, Clone)]
pub struct PictureInput<T: Pixel> {
  /// Source samples.
  pub input: Arc<Frame<T>>,
  /// Reconstructed reference picture of each prediction list.
  pub refs: [Option<Arc<Frame<T>>>; REFP_NUM],
  /// Slice type of the whole picture.
  pub slice_type: SliceType,
  /// QP of the picture. Defaults to the configured base QP.
  pub qp: Option<u8>,
  /// Per-pixel QP offsets, used when adaptive QP is enabled.
  pub qp_offsets: Option<Arc<QpOffsetMap>>,
}

impl<T: Pixel> PictureInput<T> {
  /// An intra picture at the base QP.
  pub fn intra(input: Arc<Frame<T>>) -> Self {
    PictureInput {
      input,
      refs: [None, None],
      slice_type: SliceType::I,
      qp: None,
      qp_offsets: None,
    }
  }

  /// A P picture predicted from `reference` at the base QP.
  pub fn predicted(input: Arc<Frame<T>>, reference: Arc<Frame<T>>) -> Self {
    PictureInput {
      refs: [Some(reference), None],
      slice_type: SliceType::P,
      ..Self::intra(input)
    }
  }
}

/// Outcome of the search of one picture.
#[derive(Debug, Clone)]
pub struct PictureDecision<T: Pixel> {
  /// Reconstruction of the chosen decisions.
  pub rec: Frame<T>,
  /// Coded block information of the whole picture.
  pub maps: FrameMaps,
  /// Per-CTU decisions, tile by tile, raster order within a tile.
  pub ctus: Vec<CtuDecision<T>>,
  /// Statistics of all tiles.
  pub stats: SearchStats,
}

impl<T: Pixel> PictureDecision<T> {
  /// Total rate-distortion cost of the picture.
  pub fn cost(&self) -> f64 {
    self.ctus.iter().map(|c| c.cost).sum()
  }
}

impl<T: Pixel> Context<T> {
  /// Creates a context with the reference analyzers and entropy estimator.
  ///
  /// # Errors
  ///
  /// Returns `InvalidConfig` if the config is invalid.
  ///
  /// # Examples
  ///
  /// ```
  /// use evce::prelude::*;
  ///
  /// # fn main() -> Result<(), InvalidConfig> {
  /// let enc = EncoderConfig { width: 128, height: 64, ..Default::default() };
  /// let ctx: Context<u8> = Context::new(enc)?;
  /// # Ok(())
  /// # }
  /// ```
  pub fn new(config: EncoderConfig) -> Result<Self, InvalidConfig> {
    Self::with_estimator(config, AdaptiveBitEstimator::new())
  }
}

impl<T: Pixel, E: EntropyEstimator + Clone + Send + Sync> Context<T, E> {
  /// Creates a context whose tiles each start from a copy of `est`.
  ///
  /// # Errors
  ///
  /// Returns `InvalidConfig` if the config is invalid.
  pub fn with_estimator(
    config: EncoderConfig, est: E,
  ) -> Result<Self, InvalidConfig> {
    assert!(
      8 * std::mem::size_of::<T>() >= config.bit_depth,
      "The Pixel u{} does not match the Config bit_depth {}",
      8 * std::mem::size_of::<T>(),
      config.bit_depth
    );

    config.validate()?;

    let tiling = config.tiling();
    log::info!(
      "search context: {} ({}x{} tiles of {}x{} CTUs)",
      config,
      tiling.cols,
      tiling.rows,
      tiling.tile_width_ctu,
      tiling.tile_height_ctu
    );

    Ok(Context {
      config: Arc::new(config),
      tiling,
      tools: Analyzers::default(),
      est,
    })
  }

  /// Replaces the prediction and deblocking collaborators.
  pub fn with_tools(mut self, tools: Analyzers<T>) -> Self {
    self.tools = tools;
    self
  }

  /// The validated configuration.
  pub fn config(&self) -> &EncoderConfig {
    &self.config
  }

  /// Allocates and returns a new frame.
  ///
  /// # Examples
  ///
  /// ```
  /// use evce::prelude::*;
  ///
  /// # fn main() -> Result<(), InvalidConfig> {
  /// let enc = EncoderConfig { width: 64, height: 32, ..Default::default() };
  /// let ctx: Context<u8> = Context::new(enc)?;
  /// let frame = ctx.new_frame();
  /// assert_eq!(frame.width(), 64);
  /// # Ok(())
  /// # }
  /// ```
  #[inline]
  pub fn new_frame(&self) -> Frame<T> {
    Frame::new(
      self.config.width,
      self.config.height,
      self.config.chroma_sampling,
    )
  }

  fn check_frame(&self, frame: &Frame<T>) -> Result<(), SearchError> {
    let (width, height) = (frame.width(), frame.height());
    if width != self.config.width || height != self.config.height {
      return Err(SearchError::DimensionMismatch {
        width,
        height,
        expected_width: self.config.width,
        expected_height: self.config.height,
      });
    }
    let cs = self.config.chroma_sampling;
    let Some((xdec, ydec)) = cs.get_decimation() else {
      return Err(SearchError::ChromaSamplingMismatch(cs));
    };
    let chroma = &frame.planes[1].cfg;
    if chroma.xdec != xdec || chroma.ydec != ydec {
      return Err(SearchError::ChromaSamplingMismatch(cs));
    }
    Ok(())
  }

  /// Searches every CTU of a picture, tiles in parallel.
  ///
  /// # Errors
  ///
  /// Returns `SearchError` if the picture, its references or its QP
  /// settings do not match the configuration.
  #[profiling::function]
  pub fn search_picture(
    &self, picture: &PictureInput<T>,
  ) -> Result<PictureDecision<T>, SearchError> {
    self.check_frame(&picture.input)?;
    for refp in picture.refs.iter().flatten() {
      self.check_frame(refp)?;
    }
    if !picture.slice_type.is_intra() && picture.refs[0].is_none() {
      return Err(SearchError::MissingReference(picture.slice_type));
    }
    let qp = picture.qp.unwrap_or(self.config.base_qp);
    if qp > MAX_QP {
      return Err(SearchError::InvalidQp(qp));
    }
    if let Some(map) = picture.qp_offsets.as_deref() {
      if map.width != self.config.width || map.height != self.config.height
      {
        return Err(SearchError::QpOffsetMismatch {
          width: map.width,
          height: map.height,
        });
      }
    }

    let fi = FrameInvariants::new(
      self.config.clone(),
      picture.slice_type,
      qp,
      picture.qp_offsets.clone(),
    );
    let cs = self.config.chroma_sampling;
    let input = &*picture.input;
    let refs = &picture.refs;

    let tiles: Vec<_> = self
      .tiling
      .tile_rects()
      .collect::<Vec<_>>()
      .into_par_iter()
      .map(|rect| {
        let mut ts = TileState::new(rect, input, refs, cs);
        let mut est = self.est.clone();
        let ctus = encode_tile(&fi, &self.tools, &mut ts, &mut est);
        (ts.rec, ts.maps, ctus)
      })
      .collect();

    let mut rec = self.new_frame();
    let mut maps = FrameMaps::for_picture(fi.width, fi.height);
    let mut ctus = Vec::new();
    let mut stats = SearchStats::default();
    for (tile_rec, tile_maps, tile_ctus) in tiles {
      stitch(&mut rec, &tile_rec);
      maps.scatter_from(&tile_maps);
      for ctu in tile_ctus.iter() {
        stats += &ctu.stats;
      }
      ctus.extend(tile_ctus);
    }

    let decision = PictureDecision { rec, maps, ctus, stats };
    log::debug!(
      "{:?} picture at QP {}: cost {:.1}, {} leaf evaluations",
      picture.slice_type,
      qp,
      decision.cost(),
      decision.stats.total_leaf_evaluations()
    );
    Ok(decision)
  }
}

/// Copies a tile reconstruction into the picture.
fn stitch<T: Pixel>(rec: &mut Frame<T>, tile: &TileFrame<T>) {
  for p in 0..PLANES {
    let (x, y) = tile.plane_origin(p);
    let src = &tile.frame.planes[p];
    let (w, h) = (src.cfg.width, src.cfg.height);
    let dst = &mut rec.planes[p];
    let stride = dst.cfg.stride;
    copy_rect(
      dst.data_origin_mut(),
      stride,
      x,
      y,
      src.data_origin(),
      src.cfg.stride,
      0,
      0,
      w,
      h,
    );
  }
}
